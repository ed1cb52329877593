use serde_json::Value;

const SYSTEM_PROMPT: &str = "You review corporate sustainability reports against climate \
disclosure standards. Decide whether the report passage explicitly discloses what the \
standard requires. Answer N when the passage only mentions the topic without the required \
content. Respond with JSON only, in the form \
{\"result\": [{\"reasoning\": string, \"is_disclosed\": \"Y\" | \"N\", \"confidence\": number}]} \
where confidence is your certainty between 0 and 1.";

/// Inputs for one (chunk, label) classification prompt.
#[derive(Clone, Debug)]
pub struct PromptInput<'a> {
	pub standard: &'a str,
	pub point: Option<&'a str>,
	pub examples: Vec<&'a str>,
	pub chunk: &'a str,
}

pub fn build_messages(input: &PromptInput<'_>) -> Vec<Value> {
	let mut user = format!("Disclosure standard:\n{}\n", input.standard.trim());

	if let Some(point) = input.point.map(str::trim).filter(|point| !point.is_empty())
		&& point != input.standard.trim()
	{
		user.push_str(&format!("\nKey point:\n{point}\n"));
	}

	let examples: Vec<&str> =
		input.examples.iter().map(|text| text.trim()).filter(|text| !text.is_empty()).collect();

	if !examples.is_empty() {
		user.push_str("\nPassages previously verified as disclosing this standard:\n");

		for (idx, example) in examples.iter().enumerate() {
			user.push_str(&format!("Example {}:\n{example}\n", idx + 1));
		}
	}

	user.push_str(&format!("\nReport passage:\n{}\n", input.chunk.trim()));

	vec![
		serde_json::json!({ "role": "system", "content": SYSTEM_PROMPT }),
		serde_json::json!({ "role": "user", "content": user }),
	]
}

#[cfg(test)]
mod tests {
	use super::*;

	fn user_content(messages: &[Value]) -> &str {
		messages[1]["content"].as_str().expect("user content missing")
	}

	#[test]
	fn includes_standard_examples_and_chunk() {
		let messages = build_messages(&PromptInput {
			standard: "Describe board oversight.",
			point: Some("Board oversight"),
			examples: vec!["The board meets quarterly on climate.", "  "],
			chunk: "Our board reviews climate risk annually.",
		});
		let user = user_content(&messages);

		assert_eq!(messages.len(), 2);
		assert_eq!(messages[0]["role"], "system");
		assert!(user.contains("Describe board oversight."));
		assert!(user.contains("Key point:\nBoard oversight"));
		assert!(user.contains("Example 1:\nThe board meets quarterly on climate."));
		assert!(!user.contains("Example 2"));
		assert!(user.ends_with("Our board reviews climate risk annually.\n"));
	}

	#[test]
	fn omits_optional_sections() {
		let messages = build_messages(&PromptInput {
			standard: "Board oversight",
			point: Some("Board oversight"),
			examples: Vec::new(),
			chunk: "Passage.",
		});
		let user = user_content(&messages);

		assert!(!user.contains("Key point"));
		assert!(!user.contains("previously verified"));
	}
}
