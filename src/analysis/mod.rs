pub mod calculator;
pub mod day;
pub mod health;
pub mod trend;
pub mod weights;
