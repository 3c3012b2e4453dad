/// Nickname shown on system-authored messages.
pub const SYSTEM_NICKNAME: &str = "System";

/// Default profile picture assigned to a freshly created user record.
pub const DEFAULT_PHOTO_REF: &str = "public/pfp.webp";

/// Maximum length of a text message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Maximum length of a group name, in characters.
pub const MAX_GROUP_NAME_CHARS: usize = 100;

pub const MAX_NICKNAME_CHARS: usize = 50;

/// Maximum number of results returned by user search.
pub const USER_SEARCH_LIMIT: usize = 10;

/// Object storage prefixes (path hints accepted on upload)
pub const CHAT_PICS_PREFIX: &str = "chat-pics";
pub const PROFILE_PICS_PREFIX: &str = "profile-pics";

/// Privilege state machine announcements
pub const PRIVILEGE_ACTIVATED_TEXT: &str = "Attorney Client Privilege activated";
pub const PRIVILEGE_DEACTIVATED_TEXT: &str = "Attorney Client Privilege deactivated";

/// Default nickname and introduction for the designated lawyer participant.
pub const DEFAULT_LAWYER_NICKNAME: &str = "Lawyer";
pub const DEFAULT_LAWYER_INTRO: &str =
    "Hello, I am your attorney. This conversation is now covered by attorney-client privilege.";

/// Webhook event types consumed from the payment provider
pub const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const EVENT_SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";

pub fn member_added_text(nickname: &str) -> String {
    format!("{nickname} has been added to the group")
}

pub fn member_removed_text(nickname: &str) -> String {
    format!("{nickname} has been removed from the group")
}

pub fn member_left_text(nickname: &str) -> String {
    format!("{nickname} has left the group")
}

pub fn account_deleted_text(nickname: &str) -> String {
    format!("{nickname} has deleted their account.")
}
