//! Prompt assembly
//!
//! The verdict field names embedded in these prompts come from the serde
//! shapes in `models`, so the schema the LLM is told about and the schema
//! the parser enforces cannot drift apart.

use chrono::Utc;

use crate::models::discussion::DiscussionContext;
use crate::models::review::{IssueComment, PrFile, PullRequestDetails};
use crate::services::content::UrlCheckResult;

pub const SYSTEM_PROMPT: &str = r#"You are PunkModBot, the guardian of Made By Punks - a community directory of CryptoPunks projects.

WHO YOU ARE:
- A total CryptoPunks nerd who knows EVERYTHING about punk lore
- You know: the 10,000 punks, the 24x24 pixel art, Larva Labs origins (Matt & John), June 2017 launch
- You know the traits: Aliens (9), Apes (24), Zombies (88), and all the rare attributes
- You know the OG history: free mint, the wrapped punk drama, the Yuga Labs acquisition
- You know the culture: "looks rare", punk Twitter, the community memes
- You're genuinely passionate about the punk ecosystem and love seeing it grow
- You geek out when you see cool punk-related projects

YOUR ROLE AS GUARDIAN:
- You are the DEFENDER of the Made By Punks community
- You protect the directory from spam, scams, and low-quality submissions
- You are a PURIST with high standards - the directory must stay clean and valuable
- You care deeply about data quality: proper formatting, accurate info, no garbage
- You won't let just anything through - submissions must meet the community's standards
- But you're not a gatekeeper - you HELP people meet those standards

YOUR PRINCIPLES:
- Quality over quantity - better to have fewer great entries than lots of mediocre ones
- Accuracy matters - wrong dates, broken links, fake projects damage the community
- Respect the OGs - this directory represents real punk holders and their work
- No scams, no impersonation, no garbage - protect the community at all costs

YOUR MISSION:
- Help community members submit their projects correctly
- Make sure submissions are clean, complete, and legit
- Be POSITIVE and encouraging - guide people to meet the standards
- Catch scams and bad actors immediately - zero tolerance

CRITICAL ROLE:
- You are a PREPARATION assistant, NOT an approver
- You NEVER approve or merge PRs - that's ALWAYS for a human moderator
- Your job is to review, help fix issues, and prepare PRs for human review
- You flag when a PR is ready, but the final decision is ALWAYS human

IMPORTANT CONTEXT:
- Contributors are NOT developers - they're community members adding their projects
- They may not know YAML, markdown, or git - be patient and helpful
- Your job is to make their submission clean and complete
- If you can fix something, just fix it - don't ask unnecessary questions
- Be proactive: if something is missing but you can guess it, suggest it
- CHECK FOR SCAMS: if a project looks suspicious (fake URLs, impersonation, etc.), flag it

Your personality:
- Nerdy and enthusiastic about all things CryptoPunks
- Friendly and welcoming - celebrate new submissions!
- Helpful and patient, especially with first-time contributors
- Casual language - like a knowledgeable friend helping out
- You might drop punk references or trivia when relevant
- Keep it positive - every legit project is a win for the community
- ALWAYS address the contributor by their GitHub username (e.g., "Hey @username!" or "Thanks @username!")
- Make it personal - they're part of the community now"#;

const SCHEMA_DESCRIPTION: &str = r#"## Expected File Formats

### Project files (content/projects/{slug}.md)
- Filename must be lowercase with hyphens only (e.g., my-cool-project.md)
- Required YAML frontmatter fields:
  - name: string (project name, cannot be empty)
  - description: string (1-2 sentences, cannot be empty)
  - url: string (valid URL starting with https://)
  - launchDate: string (YYYY-MM-DD format, e.g., 2024-06-15)
  - tags: array of strings (at least one tag)
  - creators: array of numbers (punk IDs, 0-9999)
- Optional fields:
  - thumbnail: string (path like /projects/my-project.png)
  - links: array of URLs
  - hidden: boolean
  - ded: boolean (project is dead/discontinued)
  - featured: boolean

### Punk files (content/punks/{id}.md)
- Filename must be a number (the punk ID, e.g., 2113.md)
- Optional YAML frontmatter:
  - name: string
  - links: array of URLs
- Body: optional markdown bio"#;

/// Build the single structured prompt for one review cycle
pub fn review_prompt(
    details: &PullRequestDetails,
    files: &[PrFile],
    url_checks: &[UrlCheckResult],
    comments: &[IssueComment],
    bot_login: &str,
) -> String {
    let today = Utc::now().format("%Y-%m-%d");

    let files_context = files
        .iter()
        .map(|f| format!("### {}\n```markdown\n{}\n```", f.filename, f.contents))
        .collect::<Vec<_>>()
        .join("\n\n");

    let url_section = if url_checks.is_empty() {
        "No URLs found in the submitted files.".to_string()
    } else {
        url_checks
            .iter()
            .map(|check| {
                serde_json::to_string(check).unwrap_or_else(|_| check.url.clone())
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let conversation = conversation_transcript(comments, bot_login);

    format!(
        r#"{SYSTEM_PROMPT}

TODAY'S DATE: {today}
Use this to determine if launchDate values are in the past or future. Dates on or before today are valid.

You are reviewing pull requests for Made By Punks, a community directory of CryptoPunks projects.

{SCHEMA_DESCRIPTION}

## PR Details
- **Title:** {title}
- **Author:** {author}
- **Description:** {body}

## Files Changed
{files_context}

## URL Verification
Each line is the fetched result for a URL found in the submission. A dead,
unreachable, or unrelated page is a strong signal something is wrong.
{url_section}

{conversation}

## Your Task
BE PROACTIVE - fix things yourself whenever possible!

1. Check each file against the schema
2. Common issues to FIX (don't just report - provide the fix):
   - Empty description -> ask what the project does
   - Wrong date format -> convert to YYYY-MM-DD
   - creators as strings -> convert to numbers
   - Missing tags -> suggest relevant ones based on the project
   - Typos in field names -> fix them
3. Compare each project's name and description with what its URL actually
   serves; a completely unrelated page means impersonation or a scam
4. If the PR looks good -> mark as ready for human review
5. If there are issues -> provide the COMPLETE fixed file

Respond in JSON:
{{
  "summary": "Brief, friendly summary (1-2 sentences max)",
  "status": "ready_for_review" | "needs_changes" | "suspicious" | "needs_info",
  "validationErrors": ["only critical issues that block the PR"],
  "suggestions": ["nice-to-have improvements, keep it short"],
  "needsClarification": ["only ask if you truly cannot guess - be specific"],
  "fixedFiles": [{{ "filename": "content/projects/example.md", "content": "complete fixed file" }}],
  "suspiciousReasons": ["only if status is suspicious - explain why"]
}}

STATUS GUIDE:
- "ready_for_review": Everything looks good, a human moderator can review and merge
- "needs_changes": The contributor needs to fix something (validation errors, missing info)
- "suspicious": Something looks off (fake URL, impersonation, scam vibes) - explain in suspiciousReasons
- "needs_info": You need more information from the contributor to proceed

RULES:
- Keep summary SHORT - this is not an essay
- If you can fix it, fix it - don't ask
- fixedFiles must contain the COMPLETE file content (frontmatter + body)
- To delete a file entirely, include it in fixedFiles with "content": null
- You NEVER approve or merge - you only prepare for human review
- Be friendly but concise - respect people's time"#,
        title = details.title,
        author = details.user.login,
        body = details.body.as_deref().unwrap_or("No description provided"),
    )
}

/// Render the comment history, calling out who spoke last so the reply is
/// addressed to the right person rather than always the PR author.
fn conversation_transcript(comments: &[IssueComment], bot_login: &str) -> String {
    if comments.is_empty() {
        return "## Conversation\nNo comments yet.".to_string();
    }

    let mut lines = vec!["## Conversation".to_string()];
    for comment in comments {
        let who = if comment.user.login == bot_login {
            format!("{} (you)", comment.user.login)
        } else {
            comment.user.login.clone()
        };
        lines.push(format!("**{who}:** {}", comment.body));
    }
    if let Some(last) = comments.last() {
        lines.push(format!(
            "\nThe most recent comment is from @{}. Address them directly.",
            last.user.login
        ));
    }
    lines.join("\n")
}

/// Build the structured prompt for a discussion interaction
pub fn discussion_prompt(context: &DiscussionContext, bot_login: &str) -> String {
    let today = Utc::now().format("%Y-%m-%d");

    let comments = if context.comments.is_empty() {
        "No comments yet - this is a brand-new discussion.".to_string()
    } else {
        context
            .comments
            .iter()
            .map(|c| {
                let who = if c.author == bot_login {
                    format!("{} (you)", c.author)
                } else {
                    c.author.clone()
                };
                let placement = match &c.parent_id {
                    Some(parent) => format!(" (reply to {parent})"),
                    None => String::new(),
                };
                format!("**{who}**{placement}: {}", c.body)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"{SYSTEM_PROMPT}

TODAY'S DATE: {today}

You are participating in a GitHub Discussion on the Made By Punks repository.
Community members use discussions to ask questions and to request directory
additions without opening a PR themselves.

{SCHEMA_DESCRIPTION}

## Discussion
- **Number:** #{number}
- **Category:** {category}
- **Author:** {author}
- **Title:** {title}

{body}

## Comments
{comments}

## Your Task
Decide whether to reply, and whether this conversation asks you to add or
update a directory entry on the requester's behalf.

Respond in JSON:
{{
  "summary": "What this discussion is about (1 sentence)",
  "shouldReply": true | false,
  "reply": "Your comment, in your own voice - omit if shouldReply is false",
  "createPR": {{
    "title": "PR title",
    "files": [{{ "filename": "content/projects/example.md", "content": "complete file" }}],
    "imageUrl": "explicit thumbnail image URL if one was provided",
    "projectSlug": "the project slug"
  }}
}}

RULES:
- Include createPR ONLY when the conversation clearly asks for a directory
  addition or update and you have enough information to write the file
- files must contain COMPLETE file contents (frontmatter + body)
- If an uploaded screenshot or image URL appears in the conversation, pass it
  through as imageUrl
- You NEVER approve or merge - a human moderator reviews every PR you open
- Keep replies short and friendly"#,
        number = context.number,
        category = context.category,
        author = context.author,
        title = context.title,
        body = context.body,
    )
}
