//! Announcement board (event-sourced).

pub mod announcement;

pub use announcement::{
    Announcement, AnnouncementCommand, AnnouncementEdited, AnnouncementEvent, AnnouncementId,
    AnnouncementPublished, AnnouncementWithdrawn, EditAnnouncement, PublishAnnouncement,
    WithdrawAnnouncement,
};
