pub mod http;
pub mod normalize;
