pub mod clinic;
pub mod price;
pub mod recommendation;
pub mod score;
pub mod sentiment;
