pub mod cart;
pub mod count;
pub mod inventory;
pub mod location;
pub mod movement;
pub mod notification;
pub mod order;
pub mod page;
pub mod request;
pub mod spare_part;
pub mod user;
pub mod warranty;

pub use cart::*;
pub use count::*;
pub use inventory::*;
pub use location::*;
pub use movement::*;
pub use notification::*;
pub use order::*;
pub use page::*;
pub use request::*;
pub use spare_part::*;
pub use user::*;
pub use warranty::*;
