pub mod influx;
pub mod telegram;
