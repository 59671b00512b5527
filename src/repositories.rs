use crate::{
    codec::{
        self, RawList, BIO_KEY, LIKED_MEMES_KEY, PROFILE_PICTURE_KEY, TOP_USERS_KEY, UPLOADED_MEMES_KEY,
        USERNAME_KEY,
    },
    domain::KeyValueStore,
    events::{ChangeNotifier, StateChange},
    models::{anonymous, Comment, LeaderboardUser, LikeState, LikedMemeSummary, MemeMeta, UploadedMeme, UserProfile},
};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{self, info};
use uuid::Uuid;

/// Single source of truth for likes, comments, the liked-memes summary, the
/// local profile and uploads. Every read goes to the key-value store.
pub struct MemeStateStore {
    kv: Arc<dyn KeyValueStore>,
    notifier: ChangeNotifier,
    // Serializes read-modify-write sequences
    write_lock: Mutex<()>,
}

impl MemeStateStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, notifier: ChangeNotifier) -> Self {
        info!("Initializing MemeStateStore");
        Self {
            kv,
            notifier,
            write_lock: Mutex::new(()),
        }
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded value is (), so a poisoned lock holds no broken state
        self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Writes all entries as one commit and publishes the change.
    /// Write failures are logged and absorbed; no change is published for them.
    fn commit(&self, entries: Vec<(String, String)>) -> bool {
        let borrowed: Vec<(&str, String)> = entries.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        match self.kv.set_many(&borrowed) {
            Ok(()) => {
                self.notifier
                    .publish(StateChange::new(entries.into_iter().map(|(key, _)| key)));
                true
            }
            Err(e) => {
                let keys: Vec<&str> = borrowed.iter().map(|(k, _)| *k).collect();
                tracing::error!(error = %e, ?keys, "Failed to commit state, change dropped");
                false
            }
        }
    }

    fn read_like_state(&self, meme_id: &str) -> LikeState {
        let likes_key = codec::likes_key(meme_id);
        let is_liked_key = codec::is_liked_key(meme_id);
        LikeState {
            meme_id: meme_id.to_string(),
            like_count: codec::decode_count(&likes_key, self.kv.get(&likes_key).as_deref()),
            is_liked: codec::decode_flag(&is_liked_key, self.kv.get(&is_liked_key).as_deref()),
        }
    }

    pub fn get_like_state(&self, meme_id: &str) -> LikeState {
        self.read_like_state(meme_id)
    }

    /// Flips the like flag, moves the local counter by one (never below zero)
    /// and keeps the liked-memes summary in step with the flag.
    pub fn toggle_like(&self, meme_id: &str, meta: &MemeMeta) -> LikeState {
        let _guard = self.lock();

        let current = self.read_like_state(meme_id);
        let is_liked = !current.is_liked;
        let like_count = if is_liked {
            current.like_count.saturating_add(1)
        } else {
            current.like_count.saturating_sub(1)
        };

        let mut liked = RawList::read(LIKED_MEMES_KEY, self.kv.get(LIKED_MEMES_KEY).as_deref());
        liked.remove_id(meme_id);
        if is_liked {
            liked.push(
                LIKED_MEMES_KEY,
                &LikedMemeSummary {
                    id: meme_id.to_string(),
                    name: meta.name.clone(),
                    url: meta.url.clone(),
                    likes: like_count,
                },
            );
        }

        let mut entries = vec![
            (codec::likes_key(meme_id), codec::encode_count(like_count)),
            (codec::is_liked_key(meme_id), codec::encode_flag(is_liked)),
        ];
        entries.extend(liked.into_entries(LIKED_MEMES_KEY));
        self.commit(entries);

        tracing::debug!(meme_id = %meme_id, like_count, is_liked, "Like toggled");
        LikeState {
            meme_id: meme_id.to_string(),
            like_count,
            is_liked,
        }
    }

    pub fn get_comments(&self, meme_id: &str) -> Vec<Comment> {
        let key = codec::comments_key(meme_id);
        codec::decode_comments(&key, self.kv.get(&key).as_deref())
    }

    /// Appends a comment by the stored username, or "Anonymous".
    /// Blank text is rejected silently and returns `None`.
    pub fn add_comment(&self, meme_id: &str, text: &str) -> Option<Comment> {
        if text.trim().is_empty() {
            tracing::debug!(meme_id = %meme_id, "Ignoring blank comment");
            return None;
        }

        let _guard = self.lock();
        let key = codec::comments_key(meme_id);
        let mut comments = RawList::read(&key, self.kv.get(&key).as_deref());

        let now = chrono::Utc::now().timestamp_millis();
        let id = comments.max_int_id().map_or(now, |last| now.max(last.saturating_add(1)));
        let username = self
            .kv
            .get(USERNAME_KEY)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(anonymous);

        let comment = Comment {
            id,
            text: text.to_string(),
            username,
        };
        comments.push(&key, &comment);
        self.commit(comments.into_entries(&key));

        tracing::debug!(meme_id = %meme_id, comment_id = id, "Comment added");
        Some(comment)
    }

    pub fn get_user_profile(&self) -> UserProfile {
        let defaults = UserProfile::default();
        let read = |key: &str, default: String| self.kv.get(key).filter(|v| !v.is_empty()).unwrap_or(default);
        UserProfile {
            name: read(USERNAME_KEY, defaults.name),
            bio: read(BIO_KEY, defaults.bio),
            profile_picture: read(PROFILE_PICTURE_KEY, defaults.profile_picture),
        }
    }

    pub fn save_user_profile(&self, profile: &UserProfile) {
        let _guard = self.lock();
        if self.commit(vec![
            (USERNAME_KEY.to_string(), profile.name.clone()),
            (BIO_KEY.to_string(), profile.bio.clone()),
            (PROFILE_PICTURE_KEY.to_string(), profile.profile_picture.clone()),
        ]) {
            info!(name = %profile.name, "Profile saved");
        }
    }

    /// Stores a newly picked picture without touching name or bio.
    pub fn set_profile_picture(&self, data_uri: &str) {
        let _guard = self.lock();
        self.commit(vec![(PROFILE_PICTURE_KEY.to_string(), data_uri.to_string())]);
    }

    pub fn liked_memes(&self) -> Vec<LikedMemeSummary> {
        codec::decode_liked_memes(self.kv.get(LIKED_MEMES_KEY).as_deref())
    }

    pub fn uploaded_memes(&self) -> Vec<UploadedMeme> {
        codec::decode_uploads(self.kv.get(UPLOADED_MEMES_KEY).as_deref())
    }

    pub fn record_upload(&self, name: &str, url: &str) -> UploadedMeme {
        let _guard = self.lock();
        let upload = UploadedMeme {
            id: Uuid::new_v4(),
            name: name.to_string(),
            url: url.to_string(),
        };
        let mut uploads = RawList::read(UPLOADED_MEMES_KEY, self.kv.get(UPLOADED_MEMES_KEY).as_deref());
        uploads.push(UPLOADED_MEMES_KEY, &upload);
        self.commit(uploads.into_entries(UPLOADED_MEMES_KEY));

        info!(upload_id = %upload.id, %url, "Upload recorded");
        upload
    }

    pub fn leaderboard_users(&self) -> Vec<LeaderboardUser> {
        codec::decode_users(self.kv.get(TOP_USERS_KEY).as_deref())
    }

    /// Writes `seed` only when the users key is absent, `null` or `[]`.
    /// Any other stored value is left alone, even one that does not decode.
    /// Returns whether it seeded.
    pub fn seed_users_if_empty(&self, seed: &[LeaderboardUser]) -> bool {
        let _guard = self.lock();
        if !RawList::read(TOP_USERS_KEY, self.kv.get(TOP_USERS_KEY).as_deref()).is_empty() {
            return false;
        }
        self.commit(vec![(TOP_USERS_KEY.to_string(), codec::encode_users(seed))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};
    use tempfile::TempDir;

    fn cat() -> MemeMeta {
        MemeMeta {
            name: "Cat".to_string(),
            url: "http://x/cat.png".to_string(),
        }
    }

    fn memory_store() -> (Arc<MemoryStore>, MemeStateStore) {
        let kv = Arc::new(MemoryStore::new());
        let store = MemeStateStore::new(kv.clone(), ChangeNotifier::new());
        (kv, store)
    }

    #[test]
    fn unknown_meme_has_default_like_state() {
        let (_, store) = memory_store();
        assert_eq!(
            store.get_like_state("m1"),
            LikeState {
                meme_id: "m1".to_string(),
                like_count: 0,
                is_liked: false,
            }
        );
    }

    #[test]
    fn double_toggle_restores_like_state() {
        let (kv, store) = memory_store();
        kv.set("likes_m2", "5").unwrap();
        kv.set("isLiked_m2", "true").unwrap();

        for id in ["m1", "m2"] {
            let before = store.get_like_state(id);
            store.toggle_like(id, &cat());
            store.toggle_like(id, &cat());
            assert_eq!(store.get_like_state(id), before);
        }
    }

    #[test]
    fn unliking_never_goes_negative() {
        let (kv, store) = memory_store();
        // Liked flag without a counter, as left by an interrupted write
        kv.set("isLiked_m1", "true").unwrap();
        assert_eq!(store.toggle_like("m1", &cat()).like_count, 0);

        kv.set("likes_m2", "-3").unwrap();
        kv.set("isLiked_m2", "true").unwrap();
        assert_eq!(store.get_like_state("m2").like_count, 0);
        let state = store.toggle_like("m2", &cat());
        assert_eq!((state.like_count, state.is_liked), (0, false));

        let state = store.toggle_like("m2", &cat());
        assert_eq!((state.like_count, state.is_liked), (1, true));
    }

    #[test]
    fn liked_summary_follows_like_flag() {
        let (_, store) = memory_store();

        let state = store.toggle_like("m1", &cat());
        let liked = store.liked_memes();
        assert_eq!(liked.len(), 1);
        assert_eq!(liked[0].id, "m1");
        assert_eq!(liked[0].likes, state.like_count);

        store.toggle_like("m1", &cat());
        assert!(store.liked_memes().iter().all(|m| m.id != "m1"));
    }

    #[test]
    fn stale_summary_is_replaced_on_like() {
        let (kv, store) = memory_store();
        kv.set(
            LIKED_MEMES_KEY,
            r#"[{"id":"m1","name":"Old","url":"http://x/old.png","likes":9}]"#,
        )
        .unwrap();

        store.toggle_like("m1", &cat());
        let liked = store.liked_memes();
        assert_eq!(liked.len(), 1);
        assert_eq!(liked[0].name, "Cat");
        assert_eq!(liked[0].likes, 1);
    }

    #[test]
    fn blank_comments_are_ignored() {
        let (_, store) = memory_store();
        assert!(store.add_comment("m1", "").is_none());
        assert!(store.add_comment("m1", "   ").is_none());
        assert!(store.get_comments("m1").is_empty());
    }

    #[test]
    fn comments_use_stored_username() {
        let (_, store) = memory_store();
        store.add_comment("m1", "hello").expect("comment accepted");

        store.save_user_profile(&UserProfile {
            name: "Dana".to_string(),
            ..UserProfile::default()
        });
        store.add_comment("m1", "again").expect("comment accepted");

        let comments = store.get_comments("m1");
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].text, "hello");
        assert_eq!(comments[0].username, "Anonymous");
        assert_eq!(comments[1].username, "Dana");
        assert!(comments[1].id > comments[0].id);
    }

    #[test]
    fn existing_thread_survives_append() {
        let (kv, store) = memory_store();
        kv.set(
            "comments_m1",
            r#"[{"id":1,"text":"old","username":"A"},{"id":2,"text":"no user"},{"id":3,"body":"other app"}]"#,
        )
        .unwrap();

        store.add_comment("m1", "new").expect("comment accepted");

        let texts: Vec<String> = store.get_comments("m1").into_iter().map(|c| c.text).collect();
        assert_eq!(texts, vec!["old", "no user", "new"]);
        // The entry this crate cannot read is still stored
        let raw = kv.get("comments_m1").unwrap();
        assert!(raw.contains("other app"));
    }

    #[test]
    fn comment_ids_saturate_at_max() {
        let (kv, store) = memory_store();
        let raw = format!(r#"[{{"id":{},"text":"last","username":"A"}}]"#, i64::MAX);
        kv.set("comments_m1", &raw).unwrap();

        let comment = store.add_comment("m1", "after").expect("comment accepted");
        assert_eq!(comment.id, i64::MAX);
        assert_eq!(store.get_comments("m1").len(), 2);
    }

    #[test]
    fn unreadable_thread_is_kept_aside() {
        let (kv, store) = memory_store();
        let mut rx = store.notifier().subscribe();
        kv.set("comments_m1", "{not a list").unwrap();

        store.add_comment("m1", "fresh").expect("comment accepted");

        assert_eq!(store.get_comments("m1").len(), 1);
        let change = rx.try_recv().expect("comment publishes");
        let backup = change
            .keys
            .iter()
            .find(|k| k.starts_with("comments_m1_unreadable_"))
            .expect("backup key written");
        assert_eq!(kv.get(backup).as_deref(), Some("{not a list"));
    }

    #[test]
    fn toggling_keeps_other_liked_entries() {
        let (kv, store) = memory_store();
        kv.set(LIKED_MEMES_KEY, r#"[{"id":42,"name":"Numeric id"},{"id":"m9","likes":"lots"}]"#)
            .unwrap();

        store.toggle_like("m1", &cat());
        store.toggle_like("m1", &cat());

        let raw = kv.get(LIKED_MEMES_KEY).unwrap();
        assert!(raw.contains("Numeric id"));
        assert!(raw.contains("lots"));
        assert!(!raw.contains("m1"));
    }

    #[test]
    fn profile_defaults_until_saved() {
        let (_, store) = memory_store();
        assert_eq!(store.get_user_profile(), UserProfile::default());

        let profile = UserProfile {
            name: "Dana".to_string(),
            bio: "Posts cats".to_string(),
            profile_picture: "data:image/png;base64,AAAA".to_string(),
        };
        store.save_user_profile(&profile);
        assert_eq!(store.get_user_profile(), profile);

        store.set_profile_picture("data:image/gif;base64,R0lG");
        let updated = store.get_user_profile();
        assert_eq!(updated.name, "Dana");
        assert_eq!(updated.profile_picture, "data:image/gif;base64,R0lG");
    }

    #[test]
    fn mutations_publish_changes_after_commit() {
        let (kv, store) = memory_store();
        let mut rx = store.notifier().subscribe();

        store.toggle_like("m1", &cat());
        let change = rx.try_recv().expect("toggle publishes");
        assert!(change.touches(LIKED_MEMES_KEY));
        assert_eq!(kv.get("likes_m1").as_deref(), Some("1"));

        store.add_comment("m1", "   ");
        assert!(rx.try_recv().is_err());

        store.add_comment("m1", "lol");
        assert!(rx.try_recv().expect("comment publishes").touches("comments_m1"));

        store.save_user_profile(&UserProfile::default());
        assert!(rx.try_recv().expect("profile publishes").touches(USERNAME_KEY));
    }

    #[test]
    fn uploads_are_appended() {
        let (_, store) = memory_store();
        let first = store.record_upload("Drake", "https://i.ibb.co/a.png");
        store.record_upload("Doge", "https://i.ibb.co/b.png");

        let uploads = store.uploaded_memes();
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0], first);
    }

    #[test]
    fn like_and_comment_survive_restart() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("state.json");

        {
            let kv = FileStore::open(&path).expect("state file opens");
            let store = MemeStateStore::new(Arc::new(kv), ChangeNotifier::new());
            let state = store.toggle_like("m1", &cat());
            assert_eq!((state.like_count, state.is_liked), (1, true));
            store.add_comment("m1", "lol").expect("comment accepted");
        }

        let kv = FileStore::open(&path).expect("state file reopens");
        let store = MemeStateStore::new(Arc::new(kv), ChangeNotifier::new());
        let state = store.get_like_state("m1");
        assert_eq!((state.like_count, state.is_liked), (1, true));

        let comments = store.get_comments("m1");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "lol");
        assert_eq!(comments[0].username, "Anonymous");
        assert_eq!(store.liked_memes()[0].url, "http://x/cat.png");
    }
}
