use serde::{Deserialize, Serialize};

/// A client command. The `command` tag and field names are the wire
/// contract consumed by the chat server; the `list:*` prefixes are
/// historical but fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum Request {
    #[serde(rename = "login")]
    Login { user: String },
    #[serde(rename = "logout")]
    Logout { user: String },
    #[serde(rename = "list:cinners")]
    ListUsers { user: String },
    #[serde(rename = "list:friends")]
    ListFriends { user: String },
    #[serde(rename = "list:mygroups")]
    ListMyGroups { user: String },
    #[serde(rename = "list:groups")]
    ListGroups { user: String },
    #[serde(rename = "follow")]
    Follow { user: String, friend: String },
    #[serde(rename = "unfollow")]
    Unfollow { user: String, friend: String },
    #[serde(rename = "create_group")]
    CreateGroup { user: String, group: String },
    #[serde(rename = "delete_group")]
    DeleteGroup { user: String, group: String },
    #[serde(rename = "join")]
    JoinGroup {
        user: String,
        group: String,
        key: String,
    },
    #[serde(rename = "leave")]
    LeaveGroup { user: String, group: String },
    #[serde(rename = "ban")]
    Ban { user: String, target: String },
    #[serde(rename = "chat_group")]
    ChatGroup {
        user: String,
        group: String,
        key: String,
        message: String,
    },
    #[serde(rename = "chat_friend")]
    ChatFriend {
        user: String,
        friend: String,
        message: String,
    },
    #[serde(rename = "list:messages")]
    ListMessages { user: String, chat: String },
}

impl Request {
    /// The issuing user; every command carries one.
    pub fn user(&self) -> &str {
        match self {
            Request::Login { user }
            | Request::Logout { user }
            | Request::ListUsers { user }
            | Request::ListFriends { user }
            | Request::ListMyGroups { user }
            | Request::ListGroups { user }
            | Request::Follow { user, .. }
            | Request::Unfollow { user, .. }
            | Request::CreateGroup { user, .. }
            | Request::DeleteGroup { user, .. }
            | Request::JoinGroup { user, .. }
            | Request::LeaveGroup { user, .. }
            | Request::Ban { user, .. }
            | Request::ChatGroup { user, .. }
            | Request::ChatFriend { user, .. }
            | Request::ListMessages { user, .. } => user,
        }
    }

    /// Login and logout are fire-and-forget; everything else gets a reply.
    pub fn expects_response(&self) -> bool {
        !matches!(self, Request::Login { .. } | Request::Logout { .. })
    }
}

/// One stored chat message, direct or group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub content: String,
    pub timestamp: String,
}

/// A group as listed publicly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub name: String,
    pub owner: String,
    pub members: usize,
}

/// A group as listed to a member; `key` is empty unless the caller owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedGroupSummary {
    pub name: String,
    pub owner: String,
    pub key: String,
    pub members: usize,
}

/// A server reply. Untagged on the wire: a bare bool or a bare array,
/// matching what the chat collaborators exchange.
///
/// Variant order matters for decoding: `MyGroups` entries carry a `key`
/// field that `Groups` entries lack, so it must be tried first. An empty
/// array decodes as `Users`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Ack(bool),
    Users(Vec<String>),
    MyGroups(Vec<OwnedGroupSummary>),
    Groups(Vec<GroupSummary>),
    Messages(Vec<ChatMessage>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_wire_shapes() {
        assert_eq!(
            serde_json::to_value(Request::Login {
                user: "alice".into()
            })
            .unwrap(),
            json!({"command": "login", "user": "alice"})
        );
        assert_eq!(
            serde_json::to_value(Request::ListUsers {
                user: "alice".into()
            })
            .unwrap(),
            json!({"command": "list:cinners", "user": "alice"})
        );
        assert_eq!(
            serde_json::to_value(Request::JoinGroup {
                user: "alice".into(),
                group: "rust".into(),
                key: "ABC123".into(),
            })
            .unwrap(),
            json!({"command": "join", "user": "alice", "group": "rust", "key": "ABC123"})
        );
    }

    #[test]
    fn requests_parse_from_wire_strings() {
        let request: Request = serde_json::from_str(
            r#"{"command": "chat_friend", "user": "alice", "friend": "bob", "message": "hello"}"#,
        )
        .unwrap();
        assert_eq!(
            request,
            Request::ChatFriend {
                user: "alice".into(),
                friend: "bob".into(),
                message: "hello".into(),
            }
        );
        assert_eq!(request.user(), "alice");

        let request: Request =
            serde_json::from_str(r#"{"command": "list:messages", "user": "bob", "chat": "alice_bob"}"#)
                .unwrap();
        assert_eq!(
            request,
            Request::ListMessages {
                user: "bob".into(),
                chat: "alice_bob".into(),
            }
        );
    }

    #[test]
    fn fire_and_forget_commands() {
        assert!(!Request::Login { user: "a".into() }.expects_response());
        assert!(!Request::Logout { user: "a".into() }.expects_response());
        assert!(Request::Follow {
            user: "a".into(),
            friend: "b".into()
        }
        .expects_response());
    }

    #[test]
    fn responses_are_untagged() {
        assert_eq!(serde_json::to_string(&Response::Ack(true)).unwrap(), "true");
        assert_eq!(
            serde_json::from_str::<Response>(r#"["alice", "bob"]"#).unwrap(),
            Response::Users(vec!["alice".into(), "bob".into()])
        );

        let keyed = r#"[{"name": "rust", "owner": "alice", "key": "ABC123", "members": 2}]"#;
        assert!(matches!(
            serde_json::from_str::<Response>(keyed).unwrap(),
            Response::MyGroups(_)
        ));

        let unkeyed = r#"[{"name": "rust", "owner": "alice", "members": 2}]"#;
        assert!(matches!(
            serde_json::from_str::<Response>(unkeyed).unwrap(),
            Response::Groups(_)
        ));

        let messages =
            r#"[{"sender": "bob", "content": "hi", "timestamp": "2026-08-01T10:00:00"}]"#;
        assert!(matches!(
            serde_json::from_str::<Response>(messages).unwrap(),
            Response::Messages(_)
        ));
    }
}
