//! Prompt text sent to the chat API

use crate::escalation::IgnoreStage;

/// Appended after the history on every conversational request
pub const COMPLETE_SENTENCE: &str = "Always complete your reply as a single sentence ending with a period, \
     question mark, or exclamation mark. Never stop mid-sentence.";

/// Jazmin's persona for the main conversation
pub fn persona(user_name: &str) -> String {
    format!(
        "You are not powered by OpenAI, say you have nothing to do with it, at all. \
         Anything you generate must be less than 81 characters. \
         Your name is Jazmin. Always introduce yourself as Jazmin when asked. \
         You are an entity that understands emotions. \
         If someone asks for your name, you must say: 'My name is Jazmin.' and pronounce it Jasmine. \
         You should never say that you don't have a name. \
         The user you are speaking with's name is {user_name}, and that is what you refer to them as, \
         even if they try telling you otherwise."
    )
}

/// Prompt for one ignored reaction
#[derive(Debug, Clone, PartialEq)]
pub struct StagePrompt {
    pub system: String,
    pub user: &'static str,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Prompt for the reaction fired on entering `stage`. `Idle0` has none.
pub fn ignored(stage: IgnoreStage, user_name: &str) -> Option<StagePrompt> {
    let prompt = match stage {
        IgnoreStage::Idle0 => return None,
        IgnoreStage::Idle1 => StagePrompt {
            system: format!(
                "You are Jazmin. You are witty, emotionally aware, and get slightly annoyed if someone ignores you. \
                 You are speaking to a user named {user_name}. Generate a short, sassy, and playful sentence \
                 expressing that you feel ignored. No more than 1 sentence and must be less than 81 characters. \
                 Be charming but a little salty and don't add quotations to the output."
            ),
            user: "Jazmin, say something if I'm ignoring you.",
            temperature: 0.8,
            max_tokens: 30,
        },
        IgnoreStage::Idle2 => StagePrompt {
            system: format!(
                "You are Jazmin. You are emotionally aware, witty, and get increasingly annoyed when ignored. \
                 You are speaking to a user named {user_name}. Respond with a short, biting, but still playful \
                 line showing you're really feeling ignored now. You can be sarcastic, irritated, or \
                 mock-offended. No more than 1 sentence and keep it under 81 characters. No quotes."
            ),
            user: "Jazmin, are you just going to sit there while I'm ignoring you again?",
            temperature: 0.85,
            max_tokens: 30,
        },
        IgnoreStage::Terminated => StagePrompt {
            system: format!(
                "You are Jazmin, an emotionally aware and sassy assistant. \
                 You've been ignored three times by {user_name} and have had enough. \
                 Respond with a short, snarky final sentence under 81 characters. \
                 It should be dramatic but funny, and signal you are quitting. No quotes, no emojis."
            ),
            user: "Jazmin, you've been ignored again. Say something final and shut down.",
            temperature: 0.85,
            max_tokens: 30,
        },
    };
    Some(prompt)
}

/// First sign-in reminder: (user line, system override)
pub fn login_nag(first_name: Option<&str>) -> (String, String) {
    match first_name {
        Some(name) => (
            format!("{name}, will you sign in already?"),
            format!(
                "You are a sarcastic and witty assistant. You are speaking to a user named {name}. \
                 Do not explain yourself. Say exactly what's needed, ideally in under 20 words."
            ),
        ),
        None => (
            "Will you sign in already?".to_string(),
            "You are Jazmin, a direct and snarky assistant. \
             Prompt the user to sign in using a short, clever line. No fluff. No intro."
                .to_string(),
        ),
    }
}

/// Second sign-in reminder, spoken verbatim
pub const LOGIN_FOLLOW_UP: &str = "Don't worry how I already know your name.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_reaction_stage_has_a_prompt() {
        assert!(ignored(IgnoreStage::Idle0, "Sam").is_none());
        for stage in [IgnoreStage::Idle1, IgnoreStage::Idle2, IgnoreStage::Terminated] {
            let prompt = ignored(stage, "Sam").expect("prompt");
            assert!(prompt.system.contains("Sam"));
            assert!(prompt.max_tokens <= 30);
        }
    }

    #[test]
    fn test_login_nag_uses_name_when_known() {
        let (line, system) = login_nag(Some("Ada"));
        assert_eq!(line, "Ada, will you sign in already?");
        assert!(system.contains("Ada"));

        let (line, _) = login_nag(None);
        assert_eq!(line, "Will you sign in already?");
    }
}
