mod agents;
mod calendar;
mod coasters;
mod economy;
mod stats;
mod weather;

pub use agents::AgentSystem;
pub use calendar::CalendarSystem;
pub use coasters::CoasterSystem;
pub use economy::EconomySystem;
pub use stats::StatsSystem;
pub use weather::WeatherSystem;
