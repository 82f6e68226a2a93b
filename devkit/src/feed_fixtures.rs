/*!
Feed fixtures shaped like the ra-state XML pages

The real pages are one flat document: scalar elements, plus `id`-keyed
elements grouped by tag. Elements the site considers abnormal carry a
`class` attribute.
*/

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    id: Option<String>,
    value: String,
    class: Option<String>,
}

/// Builder producing feed documents for tests
#[derive(Debug, Clone)]
pub struct FeedBuilder {
    root: String,
    elements: Vec<Element>,
}

impl FeedBuilder {
    /// Empty document with the given root tag
    pub fn new(root: &str) -> Self {
        Self {
            root: root.to_string(),
            elements: Vec::new(),
        }
    }

    /// Healthy Mt Pleasant 26m page, tracking, wind OK
    pub fn mt_pleasant() -> Self {
        Self::new("antenna_status")
            .set("id", None, "mp26")
            .set("telescope", None, "Mt Pleasant 26m")
            .set("time", Some("ut_date"), "2024-02-01")
            .set("time", Some("utc"), "03:00:00")
            .set("coord", Some("ra2000"), "12:00:00")
            .set("coord", Some("dec2000"), "-45:00:00")
            .set("coord", Some("az"), "90.0")
            .set("coord", Some("el"), "45.0")
            .set("antenna", Some("antenna_state"), "TRACKING")
            .set("weather", Some("wind_speed_long"), "10.0")
            .set("weather", Some("temperature"), "15.0")
            .set("weather", Some("air_pressure"), "1013.0")
            .set("weather", Some("humidity"), "50.0")
            .set("weather", Some("wind_state"), "WIND_OK")
            .set("focus", Some("receiver"), "X-band")
    }

    /// Healthy Ceduna 30m page
    pub fn ceduna() -> Self {
        Self::mt_pleasant()
            .set("id", None, "cd30")
            .set("telescope", None, "Ceduna 30m")
            .set("focus", Some("receiver"), "C-band")
    }

    /// Set (or add) an element value, clearing any anomaly flag
    pub fn set(mut self, tag: &str, id: Option<&str>, value: &str) -> Self {
        self.upsert(tag, id, value, None);
        self
    }

    /// Set (or add) an `id` element flagged as abnormal
    pub fn flag(mut self, tag: &str, id: &str, value: &str) -> Self {
        self.upsert(tag, Some(id), value, Some("alarm"));
        self
    }

    /// Remove an element
    pub fn remove(mut self, tag: &str, id: Option<&str>) -> Self {
        self.elements
            .retain(|e| !(e.tag == tag && e.id.as_deref() == id));
        self
    }

    fn upsert(&mut self, tag: &str, id: Option<&str>, value: &str, class: Option<&str>) {
        let element = Element {
            tag: tag.to_string(),
            id: id.map(str::to_string),
            value: value.to_string(),
            class: class.map(str::to_string),
        };
        match self
            .elements
            .iter_mut()
            .find(|e| e.tag == tag && e.id.as_deref() == id)
        {
            Some(existing) => *existing = element,
            None => self.elements.push(element),
        }
    }

    /// (tag, id, value) of every element, in document order
    pub fn entries(&self) -> impl Iterator<Item = (&str, Option<&str>, &str)> {
        self.elements
            .iter()
            .map(|e| (e.tag.as_str(), e.id.as_deref(), e.value.as_str()))
    }

    /// Render the XML document
    pub fn build(&self) -> String {
        let mut xml = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<{}>\n", self.root);
        for e in &self.elements {
            xml.push_str("  <");
            xml.push_str(&e.tag);
            if let Some(id) = &e.id {
                xml.push_str(&format!(" id=\"{}\"", escape(id)));
            }
            if let Some(class) = &e.class {
                xml.push_str(&format!(" class=\"{}\"", escape(class)));
            }
            xml.push_str(&format!(">{}</{}>\n", escape(&e.value), e.tag));
        }
        xml.push_str(&format!("</{}>\n", self.root));
        xml
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
