//! Normalizes raw scraper output into [`Conversation`]s.

use std::collections::HashMap;

use qaplus_core::{
    Comment, Conversation, Question, RawConversation, RawRecord, DEFAULT_CATEGORY,
    DEFAULT_COMMENT_CATEGORY, DEFAULT_SENTIMENT,
};

/// Groups questions with their comments, keeping every comment.
///
/// Comments without their own `post_id`/`post_url` inherit the question's so
/// evidence can always be traced back to a source post.
#[derive(Debug, Default, Clone, Copy)]
pub struct EvidencePreservingGrouper;

impl EvidencePreservingGrouper {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Normalize pre-grouped `{question, comments}` input.
    #[must_use]
    pub fn group_conversations(&self, raw: Vec<RawConversation>) -> Vec<Conversation> {
        let conversations: Vec<Conversation> = raw
            .into_iter()
            .map(|conv| {
                let question = normalize_question(conv.question);
                let comments = conv
                    .comments
                    .into_iter()
                    .map(|c| normalize_comment(c, &question))
                    .collect();
                Conversation { question, comments }
            })
            .collect();
        tracing::info!(conversations = conversations.len(), "grouped conversations");
        conversations
    }

    /// Group a flat list of posts and comments linked by `post_id`.
    ///
    /// Posts keep input order; each post's comments are sorted by upvotes,
    /// highest first. Comments whose post is absent are dropped.
    #[must_use]
    pub fn group_flat_records(&self, records: Vec<RawRecord>) -> Vec<Conversation> {
        let (comments, posts): (Vec<RawRecord>, Vec<RawRecord>) =
            records.into_iter().partition(RawRecord::is_comment);

        let mut by_post: HashMap<String, Vec<RawRecord>> = HashMap::new();
        let mut orphans = 0usize;
        for comment in comments {
            match comment.post_id.clone() {
                Some(post_id) => by_post.entry(post_id).or_default().push(comment),
                None => orphans += 1,
            }
        }

        let mut conversations = Vec::with_capacity(posts.len());
        for post in posts {
            let key = post.id.clone().or_else(|| post.post_id.clone());
            let mut raw_comments = key
                .as_deref()
                .and_then(|k| by_post.remove(k))
                .unwrap_or_default();
            raw_comments.sort_by(|a, b| b.upvotes.cmp(&a.upvotes));

            let mut post = post;
            if post.post_id.is_none() {
                post.post_id.clone_from(&post.id);
            }
            let question = normalize_question(post);
            let comments = raw_comments
                .into_iter()
                .map(|c| normalize_comment(c, &question))
                .collect();
            conversations.push(Conversation { question, comments });
        }

        orphans += by_post.values().map(Vec::len).sum::<usize>();
        if orphans > 0 {
            tracing::debug!(orphans, "dropped comments without a matching post");
        }
        tracing::info!(conversations = conversations.len(), "grouped flat records");
        conversations
    }
}

fn normalize_question(raw: RawRecord) -> Question {
    let sentiment = raw
        .effective_sentiment()
        .unwrap_or(DEFAULT_SENTIMENT)
        .to_string();
    let category = raw
        .effective_category()
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string();
    Question {
        id: raw.id,
        title: raw.title.unwrap_or_default(),
        body: raw.body.unwrap_or_default(),
        upvotes: raw.upvotes,
        created_at: raw.created_at,
        post_id: raw.post_id,
        post_url: raw.post_url,
        sentiment,
        category,
    }
}

fn normalize_comment(raw: RawRecord, question: &Question) -> Comment {
    let sentiment = raw
        .effective_sentiment()
        .unwrap_or(DEFAULT_SENTIMENT)
        .to_string();
    let category = raw
        .effective_category()
        .unwrap_or(DEFAULT_COMMENT_CATEGORY)
        .to_string();
    Comment {
        id: raw.id,
        body: raw.body.unwrap_or_default(),
        upvotes: raw.upvotes,
        created_at: raw.created_at,
        post_id: raw.post_id.or_else(|| question.post_id.clone()),
        post_url: raw.post_url.or_else(|| question.post_url.clone()),
        sentiment,
        original_category: category.clone(),
        category,
    }
}
