use agora_api::TOMBSTONE;
use serde_json::json;

const NUM_USERS: usize = 10;
const NUM_COMMUNITIES: usize = 4;
const MEMBERSHIPS_PER_USER: usize = 2;

const NUM_POSTS: usize = 40;
const POST_TITLE_LEN: usize = 6;

const NUM_COMMENTS: usize = 400;
const COMMENT_PARAGRAPH_COUNT: usize = 1;
const COMMENT_SENTENCE_COUNT: usize = 2;
const COMMENT_WORD_COUNT: usize = 8;

/// One in this many comments is tombstoned
const TOMBSTONE_RATIO: usize = 12;

/// One in this many comments is top-level rather than a reply
const TOP_LEVEL_RATIO: usize = 3;

/// One in this many users votes on any given post or comment
const VOTER_RATIO: usize = 3;

fn gen_post_title() -> String {
    mockd::words::sentence(POST_TITLE_LEN)
}

fn gen_comment_text() -> String {
    mockd::words::paragraph(
        COMMENT_PARAGRAPH_COUNT,
        COMMENT_SENTENCE_COUNT,
        COMMENT_WORD_COUNT,
        String::from("\n"),
    )
}

fn gen_bool_one_in(n: usize) -> bool {
    simplerand::randn(n) == 0
}

/// Disjoint up/down voter samples drawn from the user pool
fn gen_votes(users: &[String]) -> (Vec<String>, Vec<String>) {
    let mut ups = Vec::new();
    let mut downs = Vec::new();
    for u in users {
        if gen_bool_one_in(VOTER_RATIO) {
            match gen_bool_one_in(4) {
                true => downs.push(u.clone()),
                false => ups.push(u.clone()),
            }
        }
    }
    (ups, downs)
}

fn main() {
    // Generate users
    let mut users = Vec::new();
    let user_objs: Vec<serde_json::Value> = (0..NUM_USERS)
        .map(|_| {
            let uuid = mockd::unique::uuid_v4();
            users.push(uuid.clone());
            json!({
                "id": uuid,
                "name": mockd::internet::username(),
            })
        })
        .collect();
    let gen_user = || -> String { users[simplerand::randn(users.len())].clone() };

    // Generate communities; every creator is a member of their own community
    let mut communities = Vec::new();
    let community_objs: Vec<serde_json::Value> = (0..NUM_COMMUNITIES)
        .map(|_| {
            let uuid = mockd::unique::uuid_v4();
            communities.push(uuid.clone());
            let mut members = vec![gen_user()];
            for _ in 0..MEMBERSHIPS_PER_USER {
                let m = gen_user();
                if !members.contains(&m) {
                    members.push(m);
                }
            }
            json!({
                "id": uuid,
                "name": mockd::words::word(),
                "members": members,
            })
        })
        .collect();
    let gen_community = || -> String { communities[simplerand::randn(communities.len())].clone() };

    // Generate posts
    let mut posts = Vec::new();
    let post_objs: Vec<serde_json::Value> = (0..NUM_POSTS)
        .map(|_| {
            let uuid = mockd::unique::uuid_v4();
            posts.push(uuid.clone());
            let (ups, downs) = gen_votes(&users);
            json!({
                "id": uuid,
                "communityId": gen_community(),
                "authorId": gen_user(),
                "createdAt": mockd::datetime::date().to_rfc3339(),
                "title": gen_post_title(),
                "body": gen_comment_text(),
                "image": serde_json::Value::Null,
                "upVoters": ups,
                "downVoters": downs,
            })
        })
        .collect();
    let gen_post = || -> String { posts[simplerand::randn(posts.len())].clone() };

    // Generate comments; parents are earlier comments of the same post and
    // replies are dated after their parent, so the forest assembles without
    // orphans and in plausible creation order
    let mut by_post: std::collections::HashMap<String, Vec<(String, chrono::DateTime<chrono::Utc>)>> =
        std::collections::HashMap::new();
    let comment_objs: Vec<serde_json::Value> = (0..NUM_COMMENTS)
        .map(|_| {
            let uuid = mockd::unique::uuid_v4();
            let post = gen_post();
            let earlier = by_post.entry(post.clone()).or_default();
            let (parent, date) = match earlier.is_empty() || gen_bool_one_in(TOP_LEVEL_RATIO) {
                true => (serde_json::Value::Null, mockd::datetime::date()),
                false => {
                    let (id, parent_date) =
                        earlier[simplerand::randn(earlier.len())].clone();
                    let offset = chrono::Duration::minutes(simplerand::randn(600) as i64 + 1);
                    (json!(id), parent_date + offset)
                }
            };
            earlier.push((uuid.clone(), date));
            let tombstoned = gen_bool_one_in(TOMBSTONE_RATIO);
            let content = match tombstoned {
                true => String::from(TOMBSTONE),
                false => gen_comment_text(),
            };
            let (ups, downs) = gen_votes(&users);
            json!({
                "id": uuid,
                "postId": post,
                "authorId": gen_user(),
                "parentId": parent,
                "createdAt": date.to_rfc3339(),
                "content": content,
                "isDeleted": tombstoned,
                "upVoters": ups,
                "downVoters": downs,
            })
        })
        .collect();

    let fixture = json!({
        "users": user_objs,
        "communities": community_objs,
        "posts": post_objs,
        "comments": comment_objs,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&fixture).expect("serializing fixture")
    );
}
