use chrono::Utc;

use gasline_bulletin::{
    Announcement, AnnouncementCommand, AnnouncementId, EditAnnouncement, PublishAnnouncement,
    WithdrawAnnouncement,
};
use gasline_core::AggregateId;
use gasline_infra::projections::AnnouncementReadModel;

use super::AppServices;
use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

fn make_announcement(id: AggregateId) -> Announcement {
    Announcement::empty(AnnouncementId::new(id))
}

impl AppServices {
    fn announcement(&self, id: AnnouncementId) -> Result<AnnouncementReadModel, ApiError> {
        self.read_models
            .announcements
            .get(&id)
            .ok_or_else(|| ApiError::not_found("announcement"))
    }

    /// Pinned first, then newest.
    pub fn list_announcements(&self) -> Vec<AnnouncementReadModel> {
        self.read_models.announcements.list()
    }

    pub fn publish_announcement(
        &self,
        ctx: &PrincipalContext,
        title: String,
        content: String,
        pinned: bool,
    ) -> Result<AnnouncementReadModel, ApiError> {
        let agg = AggregateId::new();
        let id = AnnouncementId::new(agg);
        self.dispatch::<Announcement>(
            agg,
            Announcement::AGGREGATE_TYPE,
            AnnouncementCommand::Publish(PublishAnnouncement {
                announcement_id: id,
                author_id: ctx.user_id(),
                title,
                content,
                pinned,
                occurred_at: Utc::now(),
            }),
            make_announcement,
        )?;
        tracing::info!(announcement_id = %id, pinned, "announcement published");
        self.announcement(id)
    }

    pub fn edit_announcement(
        &self,
        id: AnnouncementId,
        title: Option<String>,
        content: Option<String>,
        pinned: Option<bool>,
    ) -> Result<AnnouncementReadModel, ApiError> {
        self.announcement(id)?;
        self.dispatch::<Announcement>(
            id.0,
            Announcement::AGGREGATE_TYPE,
            AnnouncementCommand::Edit(EditAnnouncement {
                announcement_id: id,
                title,
                content,
                pinned,
                occurred_at: Utc::now(),
            }),
            make_announcement,
        )?;
        self.announcement(id)
    }

    pub fn withdraw_announcement(&self, id: AnnouncementId) -> Result<(), ApiError> {
        self.announcement(id)?;
        self.dispatch::<Announcement>(
            id.0,
            Announcement::AGGREGATE_TYPE,
            AnnouncementCommand::Withdraw(WithdrawAnnouncement {
                announcement_id: id,
                occurred_at: Utc::now(),
            }),
            make_announcement,
        )?;
        tracing::info!(announcement_id = %id, "announcement withdrawn");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::services::test_support::{ctx, services};
    use gasline_auth::Role;
    use gasline_core::UserId;

    #[test]
    fn pinned_announcements_come_first() {
        let svc = services();
        let admin = ctx(UserId::new(), Role::Admin);

        let pinned = svc
            .publish_announcement(&admin, "Holiday hours".into(), "Closed Monday".into(), true)
            .unwrap();
        let latest = svc
            .publish_announcement(&admin, "Price update".into(), "15kg is 120".into(), false)
            .unwrap();

        let titles: Vec<_> = svc.list_announcements().into_iter().map(|a| a.title).collect();
        assert_eq!(titles, vec![pinned.title.clone(), latest.title.clone()]);

        svc.edit_announcement(pinned.id, None, None, Some(false)).unwrap();
        svc.withdraw_announcement(latest.id).unwrap();
        assert_eq!(svc.list_announcements().len(), 1);
        assert!(matches!(
            svc.withdraw_announcement(latest.id),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn titles_are_validated() {
        let svc = services();
        let admin = ctx(UserId::new(), Role::Admin);
        let err = svc
            .publish_announcement(&admin, "  ".into(), "body".into(), false)
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
