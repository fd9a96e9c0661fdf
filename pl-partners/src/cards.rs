//! Partner card view model

use pl_common::PartnerRecord;
use serde::Serialize;

pub const EMPTY_SIGNED_IN: &str = "No partners yet. Use “Add new” to register one.";
pub const EMPTY_SIGNED_OUT: &str = "No partners yet. Sign in to add one.";

/// One partner as shown in the list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartnerCard {
    pub id: i64,
    pub name: String,
    /// Address of images[0]; None renders the placeholder
    pub primary_image: Option<String>,
    /// Images beyond the primary one
    pub extra_image_count: usize,
    pub age_label: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub has_audio: bool,
    pub audio_url: Option<String>,
    /// Delete is only offered to a signed-in identity
    pub can_delete: bool,
}

impl PartnerCard {
    pub fn new(record: &PartnerRecord, signed_in: bool) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            primary_image: record.primary_image().map(|image| image.url.clone()),
            extra_image_count: record.images.len().saturating_sub(1),
            age_label: record.age.map(|age| format!("{} years", age)),
            location: record.location.clone(),
            notes: record.notes.clone(),
            has_audio: record.audio_url.is_some(),
            audio_url: record.audio_url.clone(),
            can_delete: signed_in,
        }
    }
}

pub fn cards(records: &[PartnerRecord], signed_in: bool) -> Vec<PartnerCard> {
    records.iter().map(|r| PartnerCard::new(r, signed_in)).collect()
}

pub fn empty_message(signed_in: bool) -> &'static str {
    if signed_in {
        EMPTY_SIGNED_IN
    } else {
        EMPTY_SIGNED_OUT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pl_common::ImageRef;

    fn record(images: &[&str]) -> PartnerRecord {
        PartnerRecord {
            id: 1,
            name: "Aki".into(),
            age: Some(0),
            location: None,
            notes: None,
            images: images.iter().map(|u| ImageRef::new(*u)).collect(),
            audio_url: None,
            created_at: None,
            owner_id: None,
        }
    }

    #[test]
    fn test_card_without_images_uses_placeholder() {
        let card = PartnerCard::new(&record(&[]), false);
        assert_eq!(card.primary_image, None);
        assert_eq!(card.extra_image_count, 0);
        assert!(!card.has_audio);
        assert!(!card.can_delete);
        assert_eq!(card.age_label.as_deref(), Some("0 years"));
    }

    #[test]
    fn test_card_primary_and_extra_count() {
        let card = PartnerCard::new(&record(&["a", "b", "c"]), true);
        assert_eq!(card.primary_image.as_deref(), Some("a"));
        assert_eq!(card.extra_image_count, 2);
        assert!(card.can_delete);
    }

    #[test]
    fn test_empty_message_depends_on_session() {
        assert_eq!(empty_message(true), EMPTY_SIGNED_IN);
        assert_eq!(empty_message(false), EMPTY_SIGNED_OUT);
    }
}
