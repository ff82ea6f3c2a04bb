// SPDX-License-Identifier: MPL-2.0

//! Application shell: session lifecycle, screen loading and the entry points
//! UI handlers call.
//!
//! Handlers never await. Each toggle entry point applies the optimistic change
//! before returning and leaves the network half running on the shared runtime.

use crate::backend::{Backend, BackendClient, ClientError, Session};
use crate::events::{self, EventBus, SocialEvent};
use crate::optimistic::{
    BannerQueue, ConfirmLeave, Coordinator, ErrorSurface, MutationError, Relationship,
    RelationshipKey,
};
use crate::realtime::{self, CoordinatedView, Snapshot, SnapshotTarget};
use crate::runtime;
use crate::state::{ActorSource, AppSettings, SessionError, SessionManager, SessionState};
use crate::views::{
    CommunitiesView, FeedView, NotificationsView, ProfileView, RelationshipHost, ViewHandle,
};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// The remote half of a toggle. Awaiting it is optional.
pub type Settling = JoinHandle<Result<Relationship, MutationError>>;

pub struct TouchlineApp<B: Backend> {
    backend: Arc<B>,
    session: Arc<SessionState>,
    banners: Arc<BannerQueue>,
    settings: AppSettings,
    /// Lives exactly as long as the signed-in session. Dropping it closes the
    /// session's event bus.
    scope: Mutex<Option<Arc<Coordinator<B>>>>,
}

impl TouchlineApp<BackendClient> {
    pub fn from_settings(settings: AppSettings) -> Result<Self, ClientError> {
        let client = BackendClient::new(
            &settings.backend_url,
            &settings.anon_key,
            settings.request_timeout(),
        )?;
        Ok(Self::new(client, settings))
    }
}

impl<B: Backend> TouchlineApp<B> {
    pub fn new(backend: B, settings: AppSettings) -> Self {
        Self {
            backend: Arc::new(backend),
            session: Arc::new(SessionState::new()),
            banners: Arc::new(BannerQueue::new(settings.banner_duration())),
            settings,
            scope: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn banners(&self) -> &BannerQueue {
        &self.banners
    }

    pub fn session(&self) -> Option<Session> {
        self.session.current()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_signed_in()
    }

    /// The coordinator of the current session, if any.
    pub fn coordinator(&self) -> Option<Arc<Coordinator<B>>> {
        self.scope.lock().expect("scope lock poisoned").clone()
    }

    fn start_session(&self, session: Session) {
        info!(user = %session.user_id, "session started");
        self.session.set(session);
        let coordinator = Coordinator::new(
            Arc::clone(&self.backend),
            self.session.clone() as Arc<dyn ActorSource>,
            self.banners.clone() as Arc<dyn ErrorSurface>,
            EventBus::default(),
        );
        *self.scope.lock().expect("scope lock poisoned") = Some(Arc::new(coordinator));
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let session = self.backend.sign_in(email, password).await?;
        self.start_session(session.clone());

        if self.settings.remember_session {
            if let Err(e) = SessionManager::store(&session).await {
                warn!(error = %e, "failed to persist session");
            }
        }
        Ok(session)
    }

    /// Resume a session obtained earlier, without a network round trip.
    pub fn restore(&self, session: Session) -> Result<(), SessionError> {
        if session.is_expired(Utc::now()) {
            return Err(SessionError::Expired);
        }
        self.backend.resume(&session);
        self.start_session(session);
        Ok(())
    }

    /// Resume the session kept in the secret service.
    pub async fn restore_saved(&self) -> Result<Session, SessionError> {
        let session = SessionManager::load().await?;
        self.restore(session.clone())?;
        Ok(session)
    }

    /// End the session. Toggles still in flight finish against the old
    /// coordinator; their views no longer receive bus events.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let ended = self.scope.lock().expect("scope lock poisoned").take();
        if let Some(coordinator) = ended {
            info!(in_flight = coordinator.in_flight(), "session ended");
        }
        self.session.clear();
        self.banners.clear();

        if self.settings.remember_session {
            if let Err(e) = SessionManager::clear().await {
                warn!(error = %e, "failed to clear persisted session");
            }
        }
        self.backend.sign_out().await
    }

    fn actor(&self) -> Result<String, ClientError> {
        self.session.actor_id().ok_or(ClientError::NotAuthenticated)
    }

    pub async fn open_feed(&self) -> Result<ViewHandle<FeedView>, ClientError> {
        let actor = self.actor()?;
        let posts = self
            .backend
            .fetch_feed(&actor, self.settings.feed_page_size)
            .await?;
        Ok(ViewHandle::new(FeedView::new(posts)))
    }

    /// Reload an open feed in place. Toggles still in flight stay on screen,
    /// replayed over the fetched values.
    pub async fn refresh_feed(&self, view: &ViewHandle<FeedView>) -> Result<(), ClientError> {
        let actor = self.actor()?;
        let posts = self
            .backend
            .fetch_feed(&actor, self.settings.feed_page_size)
            .await?;
        match self.coordinator() {
            Some(coordinator) => coordinator.rebase(view, |v| v.replace(posts)),
            None => view.update(|v| v.replace(posts)),
        }
        Ok(())
    }

    pub async fn open_communities(&self) -> Result<ViewHandle<CommunitiesView>, ClientError> {
        let actor = self.actor()?;
        let communities = self.backend.fetch_communities(&actor).await?;
        Ok(ViewHandle::new(CommunitiesView::new(communities)))
    }

    pub async fn open_profile(&self, user_id: &str) -> Result<ViewHandle<ProfileView>, ClientError> {
        let actor = self.actor()?;
        let profile = self.backend.fetch_profile(user_id, &actor).await?;
        Ok(ViewHandle::new(ProfileView::new(profile)))
    }

    pub async fn open_notifications(&self) -> Result<ViewHandle<NotificationsView>, ClientError> {
        let actor = self.actor()?;
        let items = self
            .backend
            .fetch_notifications(&actor, self.settings.feed_page_size)
            .await?;
        Ok(ViewHandle::new(NotificationsView::new(items)))
    }

    pub fn toggle_like(
        &self,
        view: &ViewHandle<FeedView>,
        post_id: &str,
    ) -> Result<Settling, MutationError> {
        self.spawn_toggle(view, RelationshipKey::like(post_id))
    }

    pub fn toggle_repost(
        &self,
        view: &ViewHandle<FeedView>,
        post_id: &str,
    ) -> Result<Settling, MutationError> {
        self.spawn_toggle(view, RelationshipKey::repost(post_id))
    }

    pub fn toggle_follow(
        &self,
        view: &ViewHandle<ProfileView>,
        user_id: &str,
    ) -> Result<Settling, MutationError> {
        self.spawn_toggle(view, RelationshipKey::follow(user_id))
    }

    /// Join right away, or ask through `confirm` before leaving.
    pub fn join_or_leave(
        &self,
        view: &ViewHandle<CommunitiesView>,
        community_id: &str,
        confirm: Arc<dyn ConfirmLeave>,
    ) -> Result<JoinHandle<Result<Option<Relationship>, MutationError>>, MutationError> {
        let coordinator = self.require_coordinator()?;
        let view = view.clone();
        let community_id = community_id.to_string();
        Ok(runtime::spawn(async move {
            coordinator
                .join_or_leave(&view, &community_id, &*confirm)
                .await
        }))
    }

    fn require_coordinator(&self) -> Result<Arc<Coordinator<B>>, MutationError> {
        self.coordinator().ok_or_else(|| {
            let err = MutationError::Unauthorized;
            self.banners.show_error(&err);
            err
        })
    }

    fn spawn_toggle<V: RelationshipHost>(
        &self,
        view: &ViewHandle<V>,
        key: RelationshipKey,
    ) -> Result<Settling, MutationError> {
        let coordinator = self.require_coordinator()?;
        let pending = coordinator.begin(view, key).inspect_err(|e| {
            self.banners.show_error(e);
        })?;
        Ok(runtime::spawn(
            async move { coordinator.settle(pending).await },
        ))
    }

    /// Confirmed follow and membership changes of this session.
    pub fn events(&self) -> Option<broadcast::Receiver<SocialEvent>> {
        self.coordinator().map(|c| c.events().subscribe())
    }

    /// Keep `view` in step with changes confirmed from other screens. The task
    /// ends at sign-out or when the view goes away.
    pub fn sync_with_events<V: RelationshipHost>(
        &self,
        view: &ViewHandle<V>,
    ) -> Option<JoinHandle<()>> {
        let coordinator = self.coordinator()?;
        let rx = coordinator.events().subscribe();
        let target = CoordinatedView::new(&coordinator, view.downgrade());
        Some(runtime::spawn(events::forward(rx, Box::new(target))))
    }

    /// A realtime target refreshing `view` through this session's coordinator.
    pub fn realtime_target<V: RelationshipHost>(
        &self,
        view: &ViewHandle<V>,
    ) -> Option<Box<dyn SnapshotTarget>> {
        let coordinator = self.coordinator()?;
        Some(Box::new(CoordinatedView::new(&coordinator, view.downgrade())))
    }

    /// Feed decoded realtime snapshots into `targets` until the stream ends.
    pub fn attach_realtime(
        &self,
        rx: mpsc::Receiver<Snapshot>,
        targets: Vec<Box<dyn SnapshotTarget>>,
    ) -> JoinHandle<usize> {
        runtime::spawn(realtime::pump(rx, targets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RelationshipKind;
    use crate::testing::{
        Call, FakeBackend, Reply, community, notification, profile, session, text_post,
    };
    use async_trait::async_trait;
    use std::time::Duration;

    fn app(backend: FakeBackend) -> TouchlineApp<FakeBackend> {
        TouchlineApp::new(backend, AppSettings::default())
    }

    async fn signed_in(backend: FakeBackend) -> TouchlineApp<FakeBackend> {
        let app = app(backend);
        app.login("me@example.test", "correct horse").await.unwrap();
        app
    }

    struct Decline;

    #[async_trait]
    impl ConfirmLeave for Decline {
        async fn confirm_leave(&self, _community_id: &str) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let app = app(FakeBackend::default());
        let result = app.login("me@example.test", "hunter2").await;
        assert!(matches!(result, Err(ClientError::Auth(_))));
        assert!(!app.is_signed_in());
        assert!(app.coordinator().is_none());
        assert!(app.events().is_none());
    }

    #[tokio::test]
    async fn test_login_opens_screens() {
        let backend = FakeBackend::default();
        backend.feed.lock().unwrap().push(text_post("p1", 1, false));
        backend.communities.lock().unwrap().push(community("c1", 5, true));
        backend.profiles.lock().unwrap().push(profile("u2", 10, false));
        backend.notifications.lock().unwrap().push(notification("n1"));
        let app = signed_in(backend).await;

        assert_eq!(app.session().map(|s| s.user_id), Some("me".to_string()));
        assert_eq!(app.open_feed().await.unwrap().read(|v| v.len()), 1);
        assert_eq!(
            app.open_communities()
                .await
                .unwrap()
                .read(|v| v.joined().count()),
            1
        );
        assert!(app.open_profile("u2").await.unwrap().read(|v| v.profile().is_some()));
        assert!(matches!(
            app.open_profile("nobody").await,
            Err(ClientError::NotFound)
        ));
        assert_eq!(app.open_notifications().await.unwrap().read(|v| v.unread()), 1);
    }

    #[tokio::test]
    async fn test_screens_need_a_session() {
        let app = app(FakeBackend::default());
        assert!(matches!(
            app.open_feed().await,
            Err(ClientError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_refresh_replaces_posts() {
        let backend = FakeBackend::default();
        backend.feed.lock().unwrap().push(text_post("p1", 1, false));
        let app = signed_in(backend).await;
        let view = app.open_feed().await.unwrap();

        app.backend.feed.lock().unwrap().push(text_post("p2", 0, false));
        app.refresh_feed(&view).await.unwrap();
        assert_eq!(view.read(|v| v.len()), 2);
    }

    #[tokio::test]
    async fn test_refresh_keeps_pending_like_over_fresh_counts() {
        let backend = FakeBackend::gated();
        backend.feed.lock().unwrap().push(text_post("p1", 10, false));
        backend.script([Reply::Fail(ClientError::Network("offline".into()))]);
        let app = signed_in(backend).await;
        let view = app.open_feed().await.unwrap();
        let like = RelationshipKey::like("p1");

        let settling = app.toggle_like(&view, "p1").unwrap();
        *app.backend.feed.lock().unwrap() = vec![text_post("p1", 50, false)];
        app.refresh_feed(&view).await.unwrap();
        assert_eq!(
            view.read(|v| v.relationship(&like)),
            Some(Relationship::new(true, 51))
        );

        app.backend.release(1);
        assert_eq!(
            settling.await.unwrap(),
            Err(MutationError::NetworkUnavailable)
        );
        assert_eq!(
            view.read(|v| v.relationship(&like)),
            Some(Relationship::new(false, 50))
        );
    }

    #[tokio::test]
    async fn test_toggle_without_session_offers_reauth() {
        let app = app(FakeBackend::default());
        let view = ViewHandle::new(FeedView::new(vec![text_post("p1", 10, false)]));

        let result = app.toggle_like(&view, "p1");
        assert!(matches!(result, Err(MutationError::Unauthorized)));
        assert_eq!(view.revision(), 0);
        assert!(app.backend.calls().is_empty());

        let banners = app.banners().active();
        assert_eq!(banners.len(), 1);
        assert!(banners[0].offers_reauth);
    }

    #[tokio::test]
    async fn test_toggle_is_visible_before_network_returns() {
        let app = signed_in(FakeBackend::gated()).await;
        let view = ViewHandle::new(FeedView::new(vec![text_post("p1", 3, false)]));

        let settling = app.toggle_like(&view, "p1").unwrap();
        assert_eq!(
            view.read(|v| v.relationship(&RelationshipKey::like("p1"))),
            Some(Relationship::new(true, 4))
        );
        assert_eq!(app.coordinator().unwrap().in_flight(), 1);

        app.backend.release(1);
        assert_eq!(settling.await.unwrap(), Ok(Relationship::new(true, 4)));
        assert_eq!(app.coordinator().unwrap().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failed_repost_raises_banner() {
        let backend = FakeBackend::default();
        backend.script([Reply::Fail(ClientError::Conflict("duplicate".into()))]);
        let app = signed_in(backend).await;
        let view = ViewHandle::new(FeedView::new(vec![text_post("p1", 3, false)]));

        let settling = app.toggle_repost(&view, "p1").unwrap();
        assert_eq!(settling.await.unwrap(), Err(MutationError::Conflict));
        assert_eq!(
            view.read(|v| v.relationship(&RelationshipKey::repost("p1"))),
            Some(Relationship::new(false, 0))
        );
        let banners = app.banners().active();
        assert_eq!(banners.len(), 1);
        assert!(!banners[0].offers_reauth);
    }

    #[tokio::test]
    async fn test_declined_leave_through_shell() {
        let app = signed_in(FakeBackend::default()).await;
        let view = ViewHandle::new(CommunitiesView::new(vec![community("c1", 5, true)]));

        let handle = app.join_or_leave(&view, "c1", Arc::new(Decline)).unwrap();
        assert_eq!(handle.await.unwrap(), Ok(None));
        assert!(app.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_follow_reaches_other_open_profile() {
        let app = signed_in(FakeBackend::default()).await;
        let here = ViewHandle::new(ProfileView::new(profile("u2", 100, false)));
        let elsewhere = ViewHandle::new(ProfileView::new(profile("u2", 100, false)));
        let mut redraw = elsewhere.subscribe();
        let forwarder = app.sync_with_events(&elsewhere).unwrap();

        let settling = app.toggle_follow(&here, "u2").unwrap();
        assert_eq!(settling.await.unwrap(), Ok(Relationship::new(true, 101)));

        tokio::time::timeout(Duration::from_secs(2), redraw.changed())
            .await
            .expect("event not forwarded")
            .unwrap();
        assert_eq!(
            elsewhere.read(|v| v.relationship(&RelationshipKey::follow("u2"))),
            Some(Relationship::new(true, 101))
        );
        assert_eq!(
            app.backend.calls(),
            vec![Call::Insert(RelationshipKind::Follow, "u2".into())]
        );

        app.logout().await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), forwarder)
            .await
            .expect("forwarder outlived the session")
            .unwrap();
    }

    #[tokio::test]
    async fn test_logout_closes_event_bus() {
        let app = signed_in(FakeBackend::default()).await;
        let mut rx = app.events().unwrap();

        app.logout().await.unwrap();
        assert!(!app.is_signed_in());
        assert!(app.coordinator().is_none());
        assert!(app.backend.resumed.lock().unwrap().is_none());
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_realtime_through_shell() {
        let app = signed_in(FakeBackend::default()).await;
        let view = ViewHandle::new(FeedView::new(vec![text_post("p1", 3, false)]));
        let (tx, rx) = mpsc::channel(4);
        let pump = app.attach_realtime(rx, vec![app.realtime_target(&view).unwrap()]);

        tx.send(Snapshot::PostCounts {
            post_id: "p1".into(),
            likes: 8,
            reposts: 0,
        })
        .await
        .unwrap();
        drop(tx);

        assert_eq!(pump.await.unwrap(), 1);
        assert_eq!(
            view.read(|v| v.relationship(&RelationshipKey::like("p1"))),
            Some(Relationship::new(false, 8))
        );
    }

    #[test]
    fn test_restore_session() {
        let app = app(FakeBackend::default());
        app.restore(session("u9")).unwrap();
        assert!(app.is_signed_in());
        assert_eq!(
            app.backend.resumed.lock().unwrap().as_ref().map(|s| s.user_id.clone()),
            Some("u9".to_string())
        );
    }

    #[test]
    fn test_expired_session_is_not_restored() {
        let app = app(FakeBackend::default());
        let mut stale = session("u9");
        stale.expires_at = Some(Utc::now() - chrono::Duration::minutes(5));

        assert!(matches!(app.restore(stale), Err(SessionError::Expired)));
        assert!(!app.is_signed_in());
        assert!(app.backend.resumed.lock().unwrap().is_none());
    }

    #[test]
    fn test_from_settings_rejects_bad_url() {
        let settings = AppSettings {
            backend_url: "not a url".into(),
            ..AppSettings::default()
        };
        assert!(matches!(
            TouchlineApp::from_settings(settings),
            Err(ClientError::Config(_))
        ));
    }
}
