use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::group::Group;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";
pub const MAX_IMAGE_REF_LEN: usize = 255;
/// Error key for problems that belong to the submission as a whole.
pub const NON_FIELD_ERRORS: &str = "__all__";

/// Field name -> messages. Empty means the form is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<&'static str, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A submission that could not be read as form values at all.
    pub fn unreadable(message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(NON_FIELD_ERRORS, message);
        errors
    }
}

/// Raw post form submission as received from the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostFormInput {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// The fields of a post that a form submission may set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFields {
    pub text: String,
    pub group_id: Option<Uuid>,
    pub image: Option<String>,
}

impl PostFormInput {
    /// Validate against the groups currently offered as choices.
    pub fn validate(&self, groups: &[Group]) -> Result<PostFields, FormErrors> {
        let mut errors = FormErrors::default();

        let text = self.text.trim();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }

        let group_id = match non_blank(self.group.as_deref()) {
            None => None,
            Some(raw) => match Uuid::parse_str(raw) {
                Ok(id) if groups.iter().any(|group| group.id == id) => Some(id),
                _ => {
                    errors.add("group", INVALID_CHOICE);
                    None
                }
            },
        };

        let image = non_blank(self.image.as_deref()).map(str::to_string);
        if let Some(image) = &image {
            if image.chars().count() > MAX_IMAGE_REF_LEN {
                errors.add(
                    "image",
                    format!("Ensure this value has at most {MAX_IMAGE_REF_LEN} characters."),
                );
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(PostFields {
            text: text.to_string(),
            group_id,
            image,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentFormInput {
    #[serde(default)]
    pub text: String,
}

impl CommentFormInput {
    pub fn validate(&self) -> Result<String, FormErrors> {
        let text = self.text.trim();
        if text.is_empty() {
            let mut errors = FormErrors::default();
            errors.add("text", REQUIRED);
            return Err(errors);
        }
        Ok(text.to_string())
    }
}

/// A form as handed to the client: submitted values plus any field errors.
#[derive(Debug, Clone, Serialize)]
pub struct FormView<T> {
    pub values: T,
    pub errors: FormErrors,
}

impl<T: Default> FormView<T> {
    pub fn blank() -> Self {
        Self {
            values: T::default(),
            errors: FormErrors::default(),
        }
    }
}

impl<T> FormView<T> {
    pub fn with_values(values: T) -> Self {
        Self {
            values,
            errors: FormErrors::default(),
        }
    }

    pub fn with_errors(values: T, errors: FormErrors) -> Self {
        Self { values, errors }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> Group {
        Group {
            id: Uuid::new_v4(),
            title: "Test group".to_string(),
            slug: "test-slug".to_string(),
            description: "Test description".to_string(),
        }
    }

    #[test]
    fn valid_post_form_strips_text() {
        let group = group();
        let input = PostFormInput {
            text: "  Test post  ".to_string(),
            group: Some(group.id.to_string()),
            image: Some("posts/small.gif".to_string()),
        };

        let fields = input.validate(std::slice::from_ref(&group)).unwrap();
        assert_eq!(fields.text, "Test post");
        assert_eq!(fields.group_id, Some(group.id));
        assert_eq!(fields.image.as_deref(), Some("posts/small.gif"));
    }

    #[test]
    fn blank_text_is_required() {
        let input = PostFormInput {
            text: "   ".to_string(),
            ..Default::default()
        };
        let errors = input.validate(&[]).unwrap_err();
        assert_eq!(errors.get("text").unwrap(), &[REQUIRED.to_string()]);
    }

    #[test]
    fn group_is_optional() {
        let input = PostFormInput {
            text: "No group".to_string(),
            group: Some(String::new()),
            image: Some("  ".to_string()),
        };
        let fields = input.validate(&[group()]).unwrap();
        assert_eq!(fields.group_id, None);
        assert_eq!(fields.image, None);
    }

    #[test]
    fn unknown_group_is_an_invalid_choice() {
        for raw in [Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
            let input = PostFormInput {
                text: "Text".to_string(),
                group: Some(raw),
                image: None,
            };
            let errors = input.validate(&[group()]).unwrap_err();
            assert_eq!(errors.get("group").unwrap(), &[INVALID_CHOICE.to_string()]);
            assert!(errors.get("text").is_none());
        }
    }

    #[test]
    fn overlong_image_reference_is_rejected() {
        let input = PostFormInput {
            text: "Text".to_string(),
            group: None,
            image: Some("a".repeat(MAX_IMAGE_REF_LEN + 1)),
        };
        let errors = input.validate(&[]).unwrap_err();
        assert!(errors.get("image").is_some());
    }

    #[test]
    fn comment_requires_text() {
        assert!(CommentFormInput { text: "\n".to_string() }.validate().is_err());
        assert_eq!(
            CommentFormInput { text: " nice post ".to_string() }.validate().unwrap(),
            "nice post"
        );
    }

    #[test]
    fn errors_serialize_as_field_map() {
        let mut errors = FormErrors::default();
        errors.add("text", REQUIRED);
        let value = serde_json::to_value(&errors).unwrap();
        assert_eq!(value["text"][0], REQUIRED);
    }

    #[test]
    fn unreadable_submission_is_a_form_level_error() {
        let errors = FormErrors::unreadable("expected a string");
        assert!(!errors.is_empty());
        assert_eq!(errors.get(NON_FIELD_ERRORS).unwrap(), &["expected a string".to_string()]);
        assert!(errors.get("text").is_none());
    }
}
