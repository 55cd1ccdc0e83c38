pub mod hash;
pub mod sensitive;
pub mod sign;
