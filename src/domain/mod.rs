pub mod cookie;
pub mod post;
