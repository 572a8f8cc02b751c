mod controller;
mod observable;
mod pagination;
mod slot;

pub use controller::{
    error_message, ListController, ListEvent, Loading, EMPTY_DATA_TITLE, ERROR_TITLE,
    FAILED_LOADING_MESSAGE, NO_INTERNET_MESSAGE, SCREEN_TITLE, SEARCH_BAR_PLACEHOLDER,
};
pub use observable::Observable;
pub use pagination::PaginationState;
pub use slot::LoadSlot;
