use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Number of characters of the text used as the post's short label.
pub const POST_LABEL_CHARS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRef {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    pub author: AuthorRef,
    pub group: Option<GroupRef>,
    pub image: Option<String>,
}

impl Post {
    pub fn is_authored_by(&self, user_id: Uuid) -> bool {
        self.author.id == user_id
    }
}

impl std::fmt::Display for Post {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label: String = self.text.chars().take(POST_LABEL_CHARS).collect();
        f.write_str(&label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(text: &str) -> Post {
        Post {
            id: Uuid::new_v4(),
            text: text.to_string(),
            pub_date: OffsetDateTime::now_utc(),
            author: AuthorRef {
                id: Uuid::new_v4(),
                username: "auth".to_string(),
                display_name: String::new(),
            },
            group: None,
            image: None,
        }
    }

    #[test]
    fn label_is_first_fifteen_chars() {
        let post = post("A test post that is longer than fifteen characters");
        assert_eq!(post.to_string(), "A test post tha");
    }

    #[test]
    fn label_counts_chars_not_bytes() {
        let post = post("Тестовый пост для проверки");
        assert_eq!(post.to_string(), "Тестовый пост д");
    }

    #[test]
    fn short_text_is_whole_label() {
        assert_eq!(post("short").to_string(), "short");
    }
}
