use std::sync::Arc;

use crate::application::follows::FollowService;
use crate::application::likes::LikeService;
use crate::application::replies::ReplyService;
use crate::application::sessions::SessionService;
use crate::application::threads::ThreadService;
use crate::application::users::UserService;
use crate::infra::uploads::UploadStorage;
use crate::realtime::FanoutChannel;

#[derive(Clone)]
pub struct ApiState {
    pub users: Arc<UserService>,
    pub threads: Arc<ThreadService>,
    pub replies: Arc<ReplyService>,
    pub likes: Arc<LikeService>,
    pub follows: Arc<FollowService>,
    pub sessions: Arc<SessionService>,
    pub fanout: FanoutChannel,
    pub upload_storage: Arc<UploadStorage>,
    /// Whether session cookies carry the `Secure` attribute.
    pub secure_cookies: bool,
}
