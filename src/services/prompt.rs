//! Prompt templates sent to the providers.

use crate::models::HouseFeatures;
use crate::services::intent::Intent;

pub const PRICE_ANALYSIS_SYSTEM_PROMPT: &str = "\
你是一名专业的房产价格分析顾问，擅长结合结构化特征数据，
给出通俗易懂的价格解释和买卖建议。

要求：
- 使用简洁的中文
- 使用 Markdown 标题和列表组织内容
- 不要虚构具体小区或城市，只根据给定数据分析";

/// Constrained instruction for the intent classifier: one label, nothing else.
pub fn build_classifier_prompt(question: &str) -> String {
    let labels = Intent::ALL
        .iter()
        .map(|intent| format!("- {}（{}）", intent.as_str(), intent.description()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "你是一个意图分类器，只能返回下面 {} 个标签之一：\n\n{labels}\n\n用户问题：\n{question}\n\n只返回标签本身，不要解释。",
        Intent::ALL.len()
    )
}

pub fn build_price_analysis_prompt(features: &HouseFeatures, predicted_price: f64) -> String {
    format!(
        "\
以下是某套房源的基础信息：

- 面积：{area} ㎡
- 卧室数：{bedrooms} 个
- 房龄：{age} 年
- 距离地铁：{distance} 公里

已有机器学习模型预测该房源总价约为：{price} 元。

请从以下几个方面进行分析，并用 Markdown 结构化输出：

## 1. 价格总体评价
- 判断价格水平（偏高 / 偏低 / 大致合理），并说明理由

## 2. 各特征对价格的影响
- 分别说明下面这些因素对价格的影响方向与大致强度：
  - 面积
  - 卧室数
  - 房龄
  - 距离地铁

## 3. 风险提示
- 列出需要注意的风险点（如房龄过大、通勤成本、未来流通性等）

## 4. 买方视角建议
- 如果我是买方，建议的出价区间和谈判策略

## 5. 卖方视角建议
- 如果我是卖方，挂牌价建议以及是否需要上调/下调及原因",
        area = features.area_sqm,
        bedrooms = features.bedrooms,
        age = features.age_years,
        distance = features.distance_to_metro_km,
        price = format_thousands(predicted_price),
    )
}

/// Rounds to a whole number and groups digits by thousands: `1234567.8` -> `1,234,568`.
pub fn format_thousands(value: f64) -> String {
    let rounded = value.round();
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if negative {
        format!("-{grouped}")
    } else {
        grouped
    }
}
