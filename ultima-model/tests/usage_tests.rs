//! Usage accumulated over several calls and priced per model.

use ultima_model::{ChatMessage, Llm, LlmRequest, MockLlm, Pricing, Usage};

#[tokio::test]
async fn usage_over_a_conversation_is_summed_and_priced() {
    let model = MockLlm::new("gpt-3.5-turbo")
        .with_response("a standalone question")
        .with_response("the final answer here");

    let mut total = Usage::default();
    for question in ["first question", "second one please"] {
        let request =
            LlmRequest::new(vec![ChatMessage::system("Be brief."), ChatMessage::user(question)])
                .with_temperature(0.25);
        total += model.generate(request).await.unwrap().usage;
    }

    assert_eq!(total.prompt_tokens, 2 + 2 + 2 + 3);
    assert_eq!(total.completion_tokens, 3 + 4);
    assert_eq!(total.total_tokens, total.prompt_tokens + total.completion_tokens);

    let cost = Pricing::for_model(model.name()).cost(&total);
    let expected = 9.0 / 1000.0 * 0.0015 + 7.0 / 1000.0 * 0.002;
    assert!((cost - expected).abs() < 1e-12);

    let recorded = model.requests();
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[1].temperature, Some(0.25));
}
