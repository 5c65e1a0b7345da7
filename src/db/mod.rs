pub mod auth_context;
pub mod filter;
pub mod pool;
pub mod rpc;

pub use auth_context::{acquire_as, begin_as, set_request_claims, AuthContext, AUTHENTICATED_ROLE};
pub use filter::{Direction, WhereClause};
pub use pool::create_pool;
pub use rpc::RpcCall;
