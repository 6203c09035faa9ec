pub mod station;
pub mod track;
pub mod video;
