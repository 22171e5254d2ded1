pub mod curriculum;
