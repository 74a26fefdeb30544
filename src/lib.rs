// Carbon Pilot - staged LLM pipeline for product carbon footprints

pub mod config;
pub mod orchestration;
pub mod report;
