pub mod media;
pub mod season;

pub mod prelude {
    pub use super::media::Entity as Media;
    pub use super::season::Entity as Season;
}
