mod bilibili;
mod huya;
mod twitch;

pub use bilibili::Bilibili;
pub use huya::Huya;
pub use twitch::Twitch;
