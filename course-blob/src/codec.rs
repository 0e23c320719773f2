//! Course ⇄ blob codec.
//!
//! A blob is the whole course (meta, sections and every lesson) as compact
//! JSON. Maps in the model are ordered, so encoding is deterministic and
//! `encode(decode(encode(c))) == encode(c)`.

use bytes::Bytes;
use course_core::{Course, CourseMeta, Section};
use sha2::{Digest, Sha256};

use crate::{BlobError, BlobResult, BlobStats};

/// An encoded snapshot plus the pieces cached on the pointer record.
#[derive(Debug, Clone)]
pub struct EncodedBlob {
    pub bytes: Bytes,
    pub meta: CourseMeta,
    pub sections: Vec<Section>,
    pub hash: String,
    pub stats: BlobStats,
}

/// Validate and serialize a course.
pub fn encode(course: &Course) -> BlobResult<EncodedBlob> {
    course
        .validate()
        .map_err(|e| BlobError::invalid_course(e.message))?;

    let bytes = Bytes::from(serde_json::to_vec(course)?);
    let stats = BlobStats {
        size_bytes: bytes.len() as u64,
        lesson_count: course.lesson_count() as u64,
        block_count: course.block_count() as u64,
    };

    Ok(EncodedBlob {
        hash: content_hash(&bytes),
        meta: course.meta.clone(),
        sections: course.sections.clone(),
        bytes,
        stats,
    })
}

pub fn decode(bytes: &[u8]) -> BlobResult<Course> {
    serde_json::from_slice(bytes).map_err(|e| BlobError::corrupt(format!("Invalid course blob: {e}")))
}

pub fn stats(bytes: &[u8]) -> BlobResult<BlobStats> {
    let course = decode(bytes)?;
    Ok(BlobStats {
        size_bytes: bytes.len() as u64,
        lesson_count: course.lesson_count() as u64,
        block_count: course.block_count() as u64,
    })
}

/// Lowercase hex sha-256 of the blob bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::{ContentNode, Lesson};
    use serde_json::json;

    fn course(lessons: usize) -> Course {
        let mut course = Course::new("c1", "Rust 101");
        for i in 0..lessons {
            let id = format!("l{i}");
            course.lessons.insert(
                id.clone(),
                Lesson {
                    id,
                    title: format!("Lesson {i}"),
                    blocks: vec![ContentNode::from(json!({"type": "text", "text": "hi", "n": 1.5}))],
                    ..Lesson::default()
                },
            );
        }
        course
    }

    #[test]
    fn encoding_is_stable_across_a_decode() {
        let first = encode(&course(3)).unwrap();
        let second = encode(&decode(&first.bytes).unwrap()).unwrap();
        assert_eq!(first.bytes, second.bytes);
        assert_eq!(first.hash, second.hash);
    }

    #[test]
    fn stats_match_the_course_shape() {
        let encoded = encode(&course(4)).unwrap();
        assert_eq!(encoded.stats.lesson_count, 4);
        assert_eq!(encoded.stats.block_count, 4);
        assert_eq!(stats(&encoded.bytes).unwrap(), encoded.stats);
    }

    #[test]
    fn malformed_course_is_rejected_before_serialization() {
        let err = encode(&Course::default()).unwrap_err();
        assert!(matches!(err, BlobError::InvalidCourse { .. }));
    }

    #[test]
    fn garbage_bytes_are_corrupt() {
        assert!(matches!(decode(b"not json").unwrap_err(), BlobError::Corrupt { .. }));
    }

    #[test]
    fn hash_is_hex_sha256() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
