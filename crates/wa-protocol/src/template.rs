//! Template rewrite interpreter (spec.md §4.5).
//!
//! Parsing splits out `(a|b|c)` random-choice groups once, up front, since
//! their ordering relative to the other substitution rules is load-bearing:
//! resolving them first means a brace that happens to land inside a chosen
//! alternative still goes through the later variable rules untouched by any
//! earlier pass. Variable substitution (rules 2-6) then runs on the
//! flattened text, once per recipient, in the fixed order the rules are
//! numbered.

use chrono::{DateTime, Datelike, Timelike, Utc};
use rand::Rng;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unbalanced parentheses in template")]
    UnbalancedGroup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    RandomChoice(Vec<String>),
}

/// A parsed broadcast message body, ready to be rendered once per recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

fn random_choice_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^()]*)\)").unwrap())
}

impl Template {
    /// Rule 1: split out every `(a|b|c)` group. A parenthesized group with
    /// no `|` inside is left as a literal — it's punctuation, not a choice.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        if raw.matches('(').count() != raw.matches(')').count() {
            return Err(TemplateError::UnbalancedGroup);
        }

        let mut segments = Vec::new();
        let mut last = 0;
        for caps in random_choice_re().captures_iter(raw) {
            let m = caps.get(0).unwrap();
            let inner = &caps[1];
            if !inner.contains('|') {
                continue;
            }
            if m.start() > last {
                segments.push(Segment::Literal(raw[last..m.start()].to_owned()));
            }
            segments.push(Segment::RandomChoice(
                inner.split('|').map(str::to_owned).collect(),
            ));
            last = m.end();
        }
        if last < raw.len() || segments.is_empty() {
            segments.push(Segment::Literal(raw[last..].to_owned()));
        }
        Ok(Template { segments })
    }

    /// Resolve every `(a|b|c)` group (rule 1), then apply the variable
    /// substitution rules (2-6) in order against [`RewriteContext`].
    pub fn render(&self, ctx: &RewriteContext, rng: &mut impl Rng) -> String {
        let mut flattened = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => flattened.push_str(s),
                Segment::RandomChoice(choices) => {
                    let idx = rng.gen_range(0..choices.len());
                    flattened.push_str(&choices[idx]);
                }
            }
        }
        apply_variables(&flattened, ctx)
    }
}

/// Per-recipient data the variable rules (2-6) draw from.
#[derive(Debug, Clone, Default)]
pub struct RewriteContext {
    pub whatsapp_display_name: Option<String>,
    pub contact_name: Option<String>,
    pub recipient_phone: String,
    pub custom_vars: [Option<String>; 3],
    /// Fixed clock for deterministic rendering (tests); defaults to now.
    pub now: Option<DateTime<Utc>>,
}

const DAY_NAMES: [&str; 7] = ["Senin", "Selasa", "Rabu", "Kamis", "Jumat", "Sabtu", "Minggu"];

fn apply_variables(input: &str, ctx: &RewriteContext) -> String {
    let mut out = input.to_owned();

    // rule 2: [[NAME]] -> WA display name, fallback phone
    let name_fallback = ctx
        .whatsapp_display_name
        .clone()
        .unwrap_or_else(|| ctx.recipient_phone.clone());
    out = out.replace("[[NAME]]", &name_fallback);

    // rule 3: {{NAME}}, {nama}, {{nama}} (case-insensitive). Doubled-brace
    // forms must be resolved before their single-brace counterpart, or a
    // `{nama}` replacement would eat the inner braces of `{{nama}}` first
    // and leave a stray pair behind.
    let contact_fallback = ctx
        .contact_name
        .clone()
        .unwrap_or_else(|| ctx.recipient_phone.clone());
    out = replace_ci(&out, "{{NAME}}", &contact_fallback);
    out = replace_ci(&out, "{{nama}}", &contact_fallback);
    out = replace_ci(&out, "{nama}", &contact_fallback);

    // rule 4: {nomor} -> recipient phone
    out = out.replace("{nomor}", &ctx.recipient_phone);

    // rule 5: {var1}..{var3} -> contact custom fields
    for (i, var) in ctx.custom_vars.iter().enumerate() {
        let placeholder = format!("{{var{}}}", i + 1);
        out = out.replace(&placeholder, var.as_deref().unwrap_or(""));
    }

    // rule 6: {waktu}/{tanggal}/{hari}, also doubled braces. Same
    // doubled-before-single ordering constraint as rule 3.
    let now = ctx.now.unwrap_or_else(Utc::now);
    let waktu = format!("{:02}:{:02}", now.hour(), now.minute());
    let tanggal = format!("{:02}-{:02}-{}", now.day(), now.month(), now.year());
    let hari = DAY_NAMES[now.weekday().num_days_from_monday() as usize];
    for (single, doubled, value) in [
        ("{waktu}", "{{waktu}}", waktu.as_str()),
        ("{tanggal}", "{{tanggal}}", tanggal.as_str()),
        ("{hari}", "{{hari}}", hari),
    ] {
        out = out.replace(doubled, value);
        out = out.replace(single, value);
    }

    out
}

fn replace_ci(haystack: &str, needle: &str, replacement: &str) -> String {
    let pattern = format!("(?i){}", regex::escape(needle));
    Regex::new(&pattern).unwrap().replace_all(haystack, regex::NoExpand(replacement)).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn ctx() -> RewriteContext {
        RewriteContext {
            whatsapp_display_name: Some("Budi".into()),
            contact_name: Some("Pak Budi".into()),
            recipient_phone: "628111000111".into(),
            custom_vars: [Some("Gold".into()), None, None],
            now: Some("2026-07-26T09:05:00Z".parse().unwrap()),
        }
    }

    #[test]
    fn random_choice_picks_one_alternative() {
        let template = Template::parse("Hi (Pak|Bu) there").unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let rendered = template.render(&ctx(), &mut rng);
        assert!(rendered == "Hi Pak there" || rendered == "Hi Bu there");
    }

    #[test]
    fn plain_parens_without_pipe_are_left_alone() {
        let template = Template::parse("Call us (urgent)").unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        assert_eq!(template.render(&ctx(), &mut rng), "Call us (urgent)");
    }

    #[test]
    fn rejects_unbalanced_parens() {
        assert_eq!(Template::parse("Hi (Pak|Bu"), Err(TemplateError::UnbalancedGroup));
    }

    #[test]
    fn name_falls_back_to_phone_when_absent() {
        let template = Template::parse("Hello [[NAME]]").unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let mut c = ctx();
        c.whatsapp_display_name = None;
        assert_eq!(template.render(&c, &mut rng), "Hello 628111000111");
    }

    #[test]
    fn nama_variants_are_case_insensitive_and_doubled_brace_safe() {
        let template = Template::parse("{{NAME}} / {nama} / {{nama}} / {NaMa}").unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        assert_eq!(
            template.render(&ctx(), &mut rng),
            "Pak Budi / Pak Budi / Pak Budi / Pak Budi"
        );
    }

    #[test]
    fn custom_vars_and_phone_substitute() {
        let template = Template::parse("{nomor} tier {var1} {var2}").unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        assert_eq!(template.render(&ctx(), &mut rng), "628111000111 tier Gold ");
    }

    #[test]
    fn time_date_day_render_from_fixed_clock() {
        let template = Template::parse("{waktu} {tanggal} {hari} {{waktu}}").unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        assert_eq!(
            template.render(&ctx(), &mut rng),
            "09:05 26-07-2026 Minggu 09:05"
        );
    }

    #[test]
    fn template_with_no_random_choice_is_idempotent_for_fixed_inputs() {
        let template = Template::parse("Hello {nomor}, tier {var1}").unwrap();
        let mut rng_a = rand::rngs::StdRng::seed_from_u64(2);
        let mut rng_b = rand::rngs::StdRng::seed_from_u64(99);
        assert_eq!(
            template.render(&ctx(), &mut rng_a),
            template.render(&ctx(), &mut rng_b)
        );
    }
}
