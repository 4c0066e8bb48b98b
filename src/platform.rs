use crate::types::CanvasSize;

/// Social platforms with a fixed banner canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Platform {
    Instagram,
    InstagramStory,
    Facebook,
    Twitter,
    #[default]
    Linkedin,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Instagram,
        Platform::InstagramStory,
        Platform::Facebook,
        Platform::Twitter,
        Platform::Linkedin,
    ];

    /// Case-insensitive lookup; accepts the editor's hyphenated and camelCase names.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "instagram" | "instagrampost" => Some(Platform::Instagram),
            "instagramstory" | "story" => Some(Platform::InstagramStory),
            "facebook" => Some(Platform::Facebook),
            "twitter" | "x" => Some(Platform::Twitter),
            "linkedin" => Some(Platform::Linkedin),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::InstagramStory => "instagram-story",
            Platform::Facebook => "facebook",
            Platform::Twitter => "twitter",
            Platform::Linkedin => "linkedin",
        }
    }

    pub fn canvas(self) -> CanvasSize {
        match self {
            Platform::Instagram => CanvasSize::new(1080, 1080),
            Platform::InstagramStory => CanvasSize::new(1080, 1920),
            Platform::Facebook => CanvasSize::new(1200, 630),
            Platform::Twitter => CanvasSize::new(1200, 675),
            Platform::Linkedin => CanvasSize::new(1200, 627),
        }
    }
}

/// Canvas for `name`, or the default platform's canvas when unknown.
pub fn canvas_for(name: &str) -> CanvasSize {
    Platform::from_name(name).unwrap_or_default().canvas()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(Platform::from_name("Instagram-Story"), Some(Platform::InstagramStory));
        assert_eq!(Platform::from_name("FACEBOOK"), Some(Platform::Facebook));
        assert_eq!(Platform::from_name("myspace"), None);
    }

    #[test]
    fn unknown_platform_uses_linkedin_canvas() {
        assert_eq!(canvas_for("myspace"), CanvasSize::new(1200, 627));
        assert_eq!(canvas_for("twitter"), CanvasSize::new(1200, 675));
    }

    #[test]
    fn names_round_trip() {
        for platform in Platform::ALL {
            assert_eq!(Platform::from_name(platform.name()), Some(platform));
        }
    }
}
