pub mod enumerator;
pub mod prober;
