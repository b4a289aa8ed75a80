//! Answer a pending decision

use anyhow::Result;

use crate::cli::Answer;
use crate::Paths;

pub async fn execute(paths: &Paths, answer: Answer, server: u32) -> Result<()> {
    let kind = match answer {
        Answer::Confirm => "confirm_decision",
        Answer::Decline => "decline_decision",
    };
    super::submit::execute(paths, kind, server, "cli").await
}
