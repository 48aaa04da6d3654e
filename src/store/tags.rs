use crate::batch::Tags;
use object_store::TagSet;

/// Store-level tag set for a batch, in key order.
pub fn tag_set(tags: &Tags) -> TagSet {
    let mut set = TagSet::default();
    for (key, value) in tags {
        set.push(key, value);
    }
    set
}

/// Query-string form of the tags, `k1=v1&k2=v2` sorted by key.
pub fn encode_tags(tags: &Tags) -> String {
    tag_set(tags).encoded().to_string()
}
