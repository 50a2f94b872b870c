pub mod alerts;
pub mod health;
pub mod run;
pub mod validate;
