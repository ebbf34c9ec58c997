pub mod item_service;
pub mod storage_service;

pub use item_service::ItemService;
pub use storage_service::StorageService;
