use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::ApiResult;
use crate::config::ApiConfig;
use crate::model::{ItemId, Payload};
use crate::store::{Lifetime, OpId};

/// Screen the dashboard is showing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Route {
    #[default]
    Dashboard,
    Vocabulary {
        category: String,
    },
    Listening {
        topic: String,
    },
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dashboard => f.write_str("/"),
            Self::Vocabulary { category } => write!(f, "/vocabulary/{category}"),
            Self::Listening { topic } => write!(f, "/listening/{topic}"),
        }
    }
}

/// Which mounted store an intent or response is meant for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Sidebar category list, mounted for the whole session.
    Categories,
    Vocabulary,
    Quizzes,
    FillBlanks,
    /// Practice levels of the open listening topic.
    Practice,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Categories => "categories",
            Self::Vocabulary => "vocabulary",
            Self::Quizzes => "quizzes",
            Self::FillBlanks => "fill_blanks",
            Self::Practice => "practice",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Sent once by the shell. Without a config the core reads the
    /// environment, then falls back to defaults.
    AppStarted {
        config: Option<ApiConfig>,
    },
    Navigate(Route),
    Reload(Target),

    Add {
        target: Target,
        payload: Payload,
    },
    Update {
        target: Target,
        id: ItemId,
        payload: Payload,
    },
    Remove {
        target: Target,
        id: ItemId,
    },

    AddLevel {
        name: String,
    },
    RenameLevel {
        from: String,
        to: String,
    },
    RemoveLevel {
        name: String,
    },
    AddToLevel {
        level: String,
        payload: Payload,
    },
    UpdateInLevel {
        level: String,
        id: ItemId,
        payload: Payload,
    },
    RemoveFromLevel {
        level: String,
        id: ItemId,
    },

    DismissErrors {
        target: Target,
    },

    // internal
    #[serde(skip)]
    Responded {
        target: Target,
        lifetime: Lifetime,
        op: OpId,
        result: Box<ApiResult>,
    },
}

impl Event {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AppStarted { .. } => "app_started",
            Self::Navigate(_) => "navigate",
            Self::Reload(_) => "reload",
            Self::Add { .. } => "add",
            Self::Update { .. } => "update",
            Self::Remove { .. } => "remove",
            Self::AddLevel { .. } => "add_level",
            Self::RenameLevel { .. } => "rename_level",
            Self::RemoveLevel { .. } => "remove_level",
            Self::AddToLevel { .. } => "add_to_level",
            Self::UpdateInLevel { .. } => "update_in_level",
            Self::RemoveFromLevel { .. } => "remove_from_level",
            Self::DismissErrors { .. } => "dismiss_errors",
            Self::Responded { .. } => "responded",
        }
    }

    pub const fn is_user_initiated(&self) -> bool {
        !matches!(self, Self::AppStarted { .. } | Self::Responded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_paths() {
        assert_eq!(Route::Dashboard.to_string(), "/");
        assert_eq!(
            Route::Vocabulary {
                category: "fruits".into()
            }
            .to_string(),
            "/vocabulary/fruits"
        );
    }

    #[test]
    fn test_intent_deserialises_from_shell_json() {
        let event: Event = serde_json::from_value(serde_json::json!({
            "Remove": {"target": "vocabulary", "id": "1"}
        }))
        .unwrap();
        assert!(matches!(
            event,
            Event::Remove { target: Target::Vocabulary, ref id } if id.as_str() == "1"
        ));
        assert!(event.is_user_initiated());
    }

    #[test]
    fn test_route_serde_shape() {
        let json = serde_json::to_value(Route::Listening {
            topic: "travel".into(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"screen": "listening", "topic": "travel"}));
    }
}
