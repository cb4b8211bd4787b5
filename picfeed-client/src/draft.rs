/// Compose-box text with a managed mention prefix.
///
/// The `"@username "` tag and the user's free text are stored apart and only
/// joined by [`DraftText::text`], so tag changes never touch an `@mention`
/// the user typed themselves.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DraftText {
    tag: Option<String>,
    body: String,
}

impl DraftText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Username of the managed tag, if the draft still carries one
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    fn rendered_tag(&self) -> Option<String> {
        self.tag.as_ref().map(|username| format!("@{} ", username))
    }

    /// Full text as shown in the input
    pub fn text(&self) -> String {
        match self.rendered_tag() {
            Some(tag) => format!("{}{}", tag, self.body),
            None => self.body.clone(),
        }
    }

    /// Text sent on submit
    pub fn submission_text(&self) -> String {
        self.text().trim().to_string()
    }

    pub fn is_empty(&self) -> bool {
        self.tag.is_none() && self.body.is_empty()
    }

    /// Replace the managed tag. Free text is trimmed at its edges and kept.
    pub fn retag(&mut self, username: &str) {
        self.body = self.body.trim().to_string();
        self.tag = Some(username.to_string());
    }

    /// Drop the managed tag, leaving free text exactly as typed
    pub fn untag(&mut self) {
        self.tag = None;
    }

    /// Apply a user edit of the whole input.
    ///
    /// If the edit kept the tag intact the rest becomes the free text;
    /// otherwise the user edited the tag itself and it stops being managed.
    pub fn set_text(&mut self, text: &str) {
        if let Some(tag) = self.rendered_tag() {
            if let Some(rest) = text.strip_prefix(tag.as_str()) {
                self.body = rest.to_string();
                return;
            }
            self.tag = None;
        }
        self.body = text.to_string();
    }

    pub fn clear(&mut self) {
        self.tag = None;
        self.body.clear();
    }
}
