pub mod claim;
pub mod image;
pub mod item;
pub mod response;
pub mod tag;
pub mod user;

pub use claim::*;
pub use image::*;
pub use item::*;
pub use response::*;
pub use tag::*;
pub use user::*;
