pub mod constant;
pub mod ds;
pub mod error;
pub mod im;
pub mod io;
pub mod mp;
pub mod pl;
pub mod ut;
