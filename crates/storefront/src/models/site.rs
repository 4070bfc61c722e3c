//! Site presentation models and user profiles.
//!
//! Pure CRUD state consumed by rendering; none of this participates in the
//! checkout or reconciliation flows.

use portal_sete_core::{SectionId, SectionKind, SectionLayout, SiteConfigId, UserId};
use serde::{Deserialize, Serialize};

/// Singleton site configuration row, admin-controlled.
///
/// The gateway's secret access token deliberately does not appear here: it
/// lives in the environment of the backend's payment function, never in a
/// table the client reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SiteConfig {
    #[serde(default)]
    pub id: Option<SiteConfigId>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub instagram_url: Option<String>,
    #[serde(default)]
    pub whatsapp_number: Option<String>,
    #[serde(default)]
    pub whatsapp_group_url: Option<String>,
    #[serde(default)]
    pub hero_title: String,
    #[serde(default)]
    pub hero_subtitle: String,
    #[serde(default)]
    pub hero_bg_image: Option<String>,
    #[serde(default)]
    pub top_banner_text: Option<String>,
    /// Payment gateway public key (safe to expose).
    #[serde(default)]
    pub gateway_public_key: Option<String>,
}

/// An ordered, independently toggleable content block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSection {
    pub id: SectionId,
    #[serde(rename = "type")]
    pub kind: SectionKind,
    pub layout: SectionLayout,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub is_visible: bool,
    pub display_order: i32,
    #[serde(default)]
    pub filter_tag: Option<String>,
}

/// A user profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}
