//! Back-of-the-document index. `<index-entry topic="...">` drops an
//! invisible anchor and records the location under its topic; `<index>`
//! renders all topics with links back to each recorded location.

use std::collections::BTreeMap;

#[derive(Debug)]
struct Topic {
    name: String,
    id: usize,
    /// Rendered location links, in encounter order.
    locations: Vec<String>,
}

/// Sort key: non-alphanumeric topics first, then case-insensitive with
/// a plural suffix stripped, so "Cats" and "cat" fold together.
fn topic_key(name: &str) -> (bool, String) {
    let alnum = name.chars().next().map(char::is_alphanumeric).unwrap_or(false);
    let mut folded = name.to_lowercase();
    if name.chars().count() > 2 {
        if folded.ends_with("es") {
            folded.truncate(folded.len() - 2);
        } else if folded.ends_with('s') {
            folded.truncate(folded.len() - 1);
        }
    }
    (alnum, folded)
}

#[derive(Debug, Default)]
pub struct Index {
    topics: BTreeMap<(bool, String), Topic>,
    next_id: usize,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one location for `topic` and return the anchor to embed
    /// there. The visible link text in the index is `subtopic`, or the
    /// location's ordinal when no subtopic is given.
    pub fn anchor_for_topic(&mut self, topic_name: &str, subtopic: &str) -> String {
        let key = topic_key(topic_name);
        let next_id = &mut self.next_id;
        let topic = self.topics.entry(key).or_insert_with(|| {
            *next_id += 1;
            Topic {
                name: topic_name.to_string(),
                id: *next_id,
                locations: Vec::new(),
            }
        });

        let ordinal = topic.locations.len() + 1;
        let anchor_id = format!("weftIndex-{}-{}", topic.id, ordinal);
        let visible = if subtopic.trim().is_empty() {
            ordinal.to_string()
        } else {
            subtopic.to_string()
        };
        topic.locations.push(format!(
            "<a class=\"weftTopicLocation\" href=\"#{anchor_id}\">{visible}</a>"
        ));
        format!("<a name=\"{anchor_id}\"></a>")
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Render the whole index block. `argument_list` is the rendered
    /// passthrough attributes for the outer div.
    pub fn render(&self, title: &str, argument_list: &str) -> String {
        let mut out = String::new();
        out.push_str(&format!("<div{argument_list}>\n{}\n", title.trim()));
        out.push_str("<div class=\"weftTopics\">\n");
        for topic in self.topics.values() {
            out.push_str(&format!(
                "<div class=\"weftTopicGroup\" id=\"{}\">\n\
                 \t<div class=\"weftTopic\">{}</div>\n\
                 \t<div class=\"weftTopicLocationGroup\">\n",
                topic.id, topic.name
            ));
            out.push_str(&topic.locations.join(",\n"));
            out.push_str("\n\t</div>\n</div>\n");
        }
        out.push_str("</div></div>");
        out
    }
}
