pub mod fabrik;
pub mod gradient_descent;
pub mod solver;
