pub mod rton;
