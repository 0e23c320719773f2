//! Course model.
//!
//! A course is small, hot ordering data (`meta`, `sections`) plus large,
//! cold lesson bodies. Lesson bodies and any field the editor adds that the
//! pipeline does not know about are kept as a [`ContentNode`] tree, so
//! walks over the content are exhaustive matches instead of runtime type
//! probing.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::errors::CourseError;

/// Loosely shaped editor content as a tagged tree.
///
/// Maps are ordered so that serializing the same tree twice yields the
/// same bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentNode {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<ContentNode>),
    Map(BTreeMap<String, ContentNode>),
}

impl Default for ContentNode {
    fn default() -> Self {
        ContentNode::Null
    }
}

impl ContentNode {
    pub fn text(value: impl Into<String>) -> Self {
        ContentNode::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentNode::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&ContentNode> {
        match self {
            ContentNode::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Visit every text leaf, depth first.
    pub fn visit_text(&self, f: &mut dyn FnMut(&str)) {
        match self {
            ContentNode::Text(s) => f(s),
            ContentNode::List(items) => items.iter().for_each(|n| n.visit_text(f)),
            ContentNode::Map(map) => map.values().for_each(|n| n.visit_text(f)),
            ContentNode::Null | ContentNode::Bool(_) | ContentNode::Number(_) => {}
        }
    }

    /// Visit every text leaf mutably, depth first.
    pub fn visit_text_mut(&mut self, f: &mut dyn FnMut(&mut String)) {
        match self {
            ContentNode::Text(s) => f(s),
            ContentNode::List(items) => items.iter_mut().for_each(|n| n.visit_text_mut(f)),
            ContentNode::Map(map) => map.values_mut().for_each(|n| n.visit_text_mut(f)),
            ContentNode::Null | ContentNode::Bool(_) | ContentNode::Number(_) => {}
        }
    }
}

impl From<serde_json::Value> for ContentNode {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => ContentNode::Null,
            Value::Bool(b) => ContentNode::Bool(b),
            Value::Number(n) => ContentNode::Number(n),
            Value::String(s) => ContentNode::Text(s),
            Value::Array(items) => ContentNode::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                ContentNode::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// Course metadata cached on the pointer record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseMeta {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_version: Option<u64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, ContentNode>,
}

/// Ordered section descriptor. Lessons are referenced by id only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub lesson_ids: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, ContentNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub blocks: Vec<ContentNode>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, ContentNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Course {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub meta: CourseMeta,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub lessons: BTreeMap<String, Lesson>,
}

impl Course {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            meta: CourseMeta {
                title: title.into(),
                ..CourseMeta::default()
            },
            ..Self::default()
        }
    }

    /// Bind the course to the id the request addressed and fill lesson ids
    /// from their map keys.
    pub fn bind_id(mut self, course_id: &str) -> Self {
        self.id = course_id.to_string();
        for (key, lesson) in self.lessons.iter_mut() {
            if lesson.id.is_empty() {
                lesson.id = key.clone();
            }
        }
        self
    }

    pub fn lesson_count(&self) -> usize {
        self.lessons.len()
    }

    pub fn block_count(&self) -> usize {
        self.lessons.values().map(|l| l.blocks.len()).sum()
    }

    /// Structural checks run before any network call.
    pub fn validate(&self) -> Result<(), CourseError> {
        if self.id.trim().is_empty() {
            return Err(CourseError::invalid_course("Course id is required"));
        }

        for (key, lesson) in &self.lessons {
            if key.trim().is_empty() {
                return Err(CourseError::invalid_course("Lesson key must not be empty"));
            }
            if !lesson.id.is_empty() && lesson.id != *key {
                return Err(CourseError::invalid_course(format!(
                    "Lesson id {} does not match its key {}",
                    lesson.id, key
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for section in &self.sections {
            if section.id.trim().is_empty() {
                return Err(CourseError::invalid_course("Section id is required"));
            }
            if !seen.insert(section.id.as_str()) {
                return Err(CourseError::invalid_course(format!(
                    "Duplicate section id {}",
                    section.id
                )));
            }
        }

        Ok(())
    }

    /// Visit every text leaf in the course (metadata, sections and lessons).
    pub fn visit_text(&self, f: &mut dyn FnMut(&str)) {
        self.meta.extra.values().for_each(|n| n.visit_text(f));
        for section in &self.sections {
            section.extra.values().for_each(|n| n.visit_text(f));
        }
        for lesson in self.lessons.values() {
            lesson.extra.values().for_each(|n| n.visit_text(f));
            lesson.blocks.iter().for_each(|n| n.visit_text(f));
        }
    }

    pub fn visit_text_mut(&mut self, f: &mut dyn FnMut(&mut String)) {
        self.meta.extra.values_mut().for_each(|n| n.visit_text_mut(f));
        for section in &mut self.sections {
            section.extra.values_mut().for_each(|n| n.visit_text_mut(f));
        }
        for lesson in self.lessons.values_mut() {
            lesson.extra.values_mut().for_each(|n| n.visit_text_mut(f));
            lesson.blocks.iter_mut().for_each(|n| n.visit_text_mut(f));
        }
    }
}
