pub mod call;
pub mod fix;
pub mod snapshot;
pub mod timestamp;
pub mod turn;

pub use call::*;
pub use fix::*;
pub use snapshot::*;
pub use timestamp::*;
pub use turn::*;
