//! Outbound message texts and offer formatting.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use al_catalog::mask_phone;
use al_catalog::specs::UNLIMITED_BUDGET;
use al_protocol::{CarOffer, Intent};

use super::session::Session;

pub const GREETING: &str = "Компания Автолидер приветствует Вас! Как к Вам обращаться?";
pub const ASK_NAME: &str = "Пожалуйста, укажите Ваше имя.";
pub const ASK_TOPIC: &str = "Что Вас интересует: покупка/продажа авто, ремонт, запчасти, бухгалтерия?";
pub const ASK_BUDGET: &str = "До какой суммы рассматриваете автомобиль?";
pub const ASK_BUDGET_AGAIN: &str = "Пожалуйста, укажите бюджет (например, 'до 2.5 млн' или '2500000 рублей').";
pub const ASK_BODY: &str =
    "Нужен какой-то определённый тип кузова (кроссовер, седан, пикап) или можно разные варианты?";
pub const ASK_PURCHASE_DETAILS: &str = "Правильно понимаю, Вы хотите купить автомобиль? Подскажите, новый или с пробегом, и какую марку/модель рассматриваете?";
pub const ASK_BRAND_AGAIN: &str = "Не удалось определить марку. Пожалуйста, укажите марку и модель автомобиля.";
pub const ASK_OWNED_CAR: &str = "Какой у Вас автомобиль (марка и модель)?";
pub const ASK_OWNED_BRAND: &str = "Подскажите, какой у Вас автомобиль (марка)?";
pub const ASK_PHONE_PLAIN: &str = "Оставьте, пожалуйста, номер телефона, по которому Вам удобно принять звонок.";
pub const ASK_REPAIR_TYPE: &str =
    "Это слесарный ремонт (двигатель, подвеска, ТО) или кузовной (вмятины, покраска, после ДТП)?";
pub const ASK_REPAIR_TYPE_AGAIN: &str = "Пожалуйста, укажите тип ремонта: слесарный (двигатель, подвеска, ТО) или кузовной (вмятины, покраска, после ДТП).";
pub const SERVICE_IN_SEARCH: &str = "Понял, Вас интересует сервис/обслуживание. Уточните, пожалуйста, какой ремонт нужен: слесарный (двигатель, подвеска, ТО) или кузовной?";
pub const CLARIFY: &str =
    "Не совсем понял Ваш запрос. Пожалуйста, уточните, что Вас интересует: покупка, ремонт или другое?";
pub const FALLBACK_WITH_PHONE: &str = "Извините, я Вас не понял. В течение 10 минут Вам перезвонит специалист.";

pub const PHONE_NOT_IN_SESSION: &str = "Извините, не нашел Ваш номер в текущей сессии. Пожалуйста, напишите его.";
pub const PHONE_NOT_IN_SESSION_SEARCH: &str =
    "Извините, не смог найти Ваш номер в текущей сессии. Напишите его еще раз, пожалуйста.";
pub const PHONE_RETRY: &str = "Не удалось распознать номер телефона. Пожалуйста, укажите номер в формате +7XXXXXXXXXX или 8XXXXXXXXXX.";
pub const PHONE_GIVE_UP: &str =
    "Не удалось распознать номер телефона. Пожалуйста, напишите /start для начала нового запроса.";
pub const PHONE_FIX: &str = "Пожалуйста, введите верный номер телефона.";

pub const CONFIRMED: &str = "Менеджер свяжется с Вами в течение 10 минут.";
pub const RESTART_HINT: &str = "Хорошо, давайте начнем сначала. Напишите /start.";
pub const CONFIRM_UNCLEAR: &str = "Не совсем понял Ваш ответ. Пожалуйста, подтвердите, что все верно, написав 'Да', или укажите марку авто для исправления.";

pub const NOTHING_FOUND: &str = "К сожалению, по таким параметрам сейчас нет автомобилей в наличии.";
pub const CATALOG_UPDATING: &str = "Сейчас каталог обновляется. Оставьте заявку, менеджер свяжется с Вами.";
pub const OFFER_MANAGER_HELP: &str = "Могу предложить помощь менеджера, чтобы подобрать альтернативу индивидуально.";

pub const HEADER_POWER: &str = "Подобрал для Вас самые мощные варианты по вашим критериям:";
pub const HEADER_EXPENSIVE: &str = "Подобрал для Вас максимальные комплектации:";
pub const HEADER_MORE_EXPENSIVE: &str = "Посмотрел варианты подороже:";
pub const HEADER_DEFAULT: &str = "По вашим параметрам подобрал варианты:";

const PHONE_PROMPT: &str = "Оставьте свой номер телефона, Вам в течение 10 минут позвонит специалист.";
const SPECIALIST_PROMPT: &str =
    "Хотите поговорить со специалистом? ответьте \"ДА\", и он перезвонит Вам в течение 10 минут";

/// Closing line for search answers.
pub fn phone_prompt(has_phone: bool) -> &'static str {
    if has_phone { SPECIALIST_PROMPT } else { PHONE_PROMPT }
}

/// Same prompt, addressed after the user's name ("Иван, оставьте ...").
pub fn phone_prompt_addressed(has_phone: bool) -> String {
    if has_phone {
        SPECIALIST_PROMPT.to_string()
    } else {
        "оставьте, пожалуйста, Ваш номер телефона, Вам в течение 10 минут позвонит специалист.".to_string()
    }
}

pub fn greet_named(name: &str) -> String {
    format!("Приятно познакомиться, {name}! {ASK_TOPIC}")
}

pub fn ask_phone_for_service(name: &str) -> String {
    format!(
        "Да, мы можем это сделать. {name}, оставьте, пожалуйста, Ваш номер телефона, в течение 10 минут Вам перезвонит специалист."
    )
}

pub fn ask_phone_named(name: &str) -> String {
    format!("{name}, оставьте, пожалуйста, Ваш номер телефона, в течение 10 минут Вам перезвонит специалист.")
}

pub fn ask_phone_for_manager(name: &str) -> String {
    format!(
        "Хорошо, передам запрос менеджеру.\n{name}, оставьте, пожалуйста, Ваш номер телефона, Вам в течение 10 минут позвонит специалист."
    )
}

pub fn ask_phone_after_fallback(name: &str) -> String {
    format!(
        "Извините, я Вас не понял. {name}, оставьте, пожалуйста, свой номер телефона, в течение 10 минут Вам перезвонит специалист"
    )
}

pub fn ask_buy_or_service(brand: &str) -> String {
    format!("Вас интересует покупка автомобиля {brand} или ремонт/обслуживание этого автомобиля?")
}

pub fn ask_same_brand(brand: &str) -> String {
    format!("Вы хотите купить автомобиль {brand} или рассматриваете другой вариант?")
}

pub fn ownership_follow_up(brand: &str) -> String {
    format!("Понял, у Вас {brand}. Планируете обменять его на новый (Trade-in), продать или нужно обслуживание?")
}

/// Preset repair job: confirm the car, or ask for it.
pub fn confirm_repair_car(details: &str, brand: Option<&str>) -> String {
    match brand {
        Some(brand) => format!("Понял, Вас интересует {details}. Ваш автомобиль - {brand}?"),
        None => format!("Понял, Вас интересует {details}. Какой у Вас автомобиль (марка)?"),
    }
}

pub fn brand_corrected(brand: &str) -> String {
    format!("Понял, исправляем на {brand}.")
}

/// "Chery, Jetour и Haval".
pub fn join_ru(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} и {last}", init.join(", ")),
    }
}

/// Apology for a brand the dealership does not sell new.
pub fn non_dealer_notice(company: &str, brand: &str, dealer_brands: &[String]) -> String {
    format!(
        "Компания \"{company}\" не может предложить Вам новый автомобиль {brand}. \
         Зато у нас есть новые автомобили {}. Что из этого Вас интересует? \
         Если же Вы всё-таки хотите купить автомобиль {brand}, могу организовать Вам звонок из отдела автомобилей с пробегом.",
        join_ru(dealer_brands)
    )
}

/// Thousands separated by spaces: `2 700 000`.
pub fn format_price(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

fn drive_label(drive: &str) -> &str {
    match drive.to_lowercase().as_str() {
        "4x4" => "полный",
        "передний" => "передний",
        "задний" => "задний",
        _ => drive,
    }
}

/// Non-zero discounts. `gov_label` differs between the listing and the detail card.
fn discounts(offer: &CarOffer, gov_label: &str) -> Vec<String> {
    [
        ("Трейд-ин", offer.discount_tradein),
        ("Кредит", offer.discount_credit),
        (gov_label, offer.discount_gov),
        ("Спец", offer.discount_other),
    ]
    .into_iter()
    .filter(|(_, v)| *v > 0)
    .map(|(label, v)| format!("{label}: {}", format_price(v)))
    .collect()
}

fn listed_base_price(offer: &CarOffer) -> Option<u64> {
    offer.base_price.filter(|b| *b > offer.final_price)
}

/// Numbered search results.
pub fn offer_listing(header: &str, offers: &[CarOffer]) -> String {
    let mut out = format!("{header}\n");
    for (i, car) in offers.iter().enumerate() {
        let mut price = format!("Цена с учетом скидок: {} ₽", format_price(car.final_price));
        let discounts = discounts(car, "Гос");
        match listed_base_price(car) {
            Some(base) => {
                price.push_str(&format!("\n     (РРЦ: {} ₽", format_price(base)));
                if !discounts.is_empty() {
                    price.push_str(&format!(". Скидки: {}", discounts.join(", ")));
                }
                price.push(')');
            }
            None if !discounts.is_empty() => {
                price.push_str(&format!("\n     (Скидки: {})", discounts.join(", ")));
            }
            None => {}
        }
        out.push_str(&format!(
            "\n{}. {}\n   • {}, {}, {} {} л.с.\n   • {} ({})\n   • {price}\n",
            i + 1,
            car.full_name(),
            car.body,
            drive_label(&car.drive),
            car.engine_type,
            car.power,
            car.transmission,
            car.transmission_details,
        ));
    }
    out.push_str("\nХотите посмотреть подробнее (цвета, скидки) или подобрать ещё варианты?");
    out
}

/// Answer to a message naming catalog models directly.
pub fn model_response(found: &[CarOffer], default_delivery_days: u32) -> String {
    let mut sorted: Vec<&CarOffer> = found.iter().collect();
    sorted.sort_by_key(|o| o.final_price);
    let Some(first) = sorted.first() else {
        return NOTHING_FOUND.to_string();
    };

    let mut out = format!("Да, {} есть в наличии.\n\n", first.model_name());

    let mut seen = HashSet::new();
    let mut shown = 0;
    for car in &sorted {
        let key = (&car.trim, &car.engine_type, car.power, &car.drive, &car.transmission);
        if !seen.insert(key) {
            continue;
        }
        let mut price = format!("{} руб", format_price(car.final_price));
        let discounts = discounts(car, "Гос");
        match listed_base_price(car) {
            Some(base) => {
                price.push_str(&format!(" (РРЦ: {} руб", format_price(base)));
                if !discounts.is_empty() {
                    price.push_str(&format!(", Скидки: {}", discounts.join(", ")));
                }
                price.push(')');
            }
            None if !discounts.is_empty() => price.push_str(&format!(" (Скидки: {})", discounts.join(", "))),
            None => {}
        }
        out.push_str(&format!(
            "• {} {} {}л.с. {} — {price}\n",
            car.trim, car.engine_type, car.power, car.drive
        ));
        shown += 1;
        if shown >= 5 {
            break;
        }
    }

    let remaining = sorted.len() - shown;
    if remaining > 0 {
        out.push_str(&format!("... и ещё {remaining} вариантов.\n"));
    }

    let colors: BTreeSet<&str> = sorted
        .iter()
        .flat_map(|c| c.available_colors.iter().map(String::as_str))
        .collect();
    if !colors.is_empty() {
        out.push_str(&format!(
            "\nВ наличии цвета: {}.",
            colors.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }

    let delivery = sorted
        .iter()
        .filter_map(|c| c.delivery_days)
        .max()
        .unwrap_or(default_delivery_days);
    out.push_str(&format!("\nЕсли хотите другой цвет — срок поставки {delivery} дней.\n"));
    out.push_str("\nХотите рассчитать точную цену со всеми скидками или оформить бронирование?");
    out
}

/// Colors per named model.
pub fn color_overview(offers: &[CarOffer], default_delivery_days: u32) -> String {
    let mut grouped: BTreeMap<(String, String), Vec<&CarOffer>> = BTreeMap::new();
    for car in offers {
        grouped
            .entry((car.brand.clone(), car.model.clone()))
            .or_default()
            .push(car);
    }
    if grouped.is_empty() {
        return "По указанным моделям сейчас нет информации о цветах.".to_string();
    }

    let lines: Vec<String> = grouped
        .into_iter()
        .map(|((brand, model), cars)| {
            let colors: BTreeSet<&str> = cars
                .iter()
                .flat_map(|c| c.available_colors.iter().map(String::as_str))
                .collect();
            if colors.is_empty() {
                let days = cars
                    .iter()
                    .map(|c| c.delivery_days.unwrap_or(default_delivery_days))
                    .min()
                    .unwrap_or(default_delivery_days);
                format!("{brand} {model}: в наличии нет. Срок поставки {days} дней.")
            } else {
                format!("{brand} {model}: {}", colors.into_iter().collect::<Vec<_>>().join(", "))
            }
        })
        .collect();
    format!("По вашим моделям доступны такие цвета:\n{}", lines.join("\n"))
}

/// Detail card for one cached variant.
pub fn offer_detail(car: &CarOffer, default_delivery_days: u32) -> String {
    let colors = if car.available_colors.is_empty() {
        "уточняйте у менеджера".to_string()
    } else {
        car.available_colors.iter().cloned().collect::<Vec<_>>().join(", ")
    };
    let mut out = format!(
        "🚙 {}\n\n🎨 Цвета в наличии: {colors}\n💰 Цена итого: {} ₽\n",
        car.full_name(),
        format_price(car.final_price)
    );
    if let Some(base) = listed_base_price(car) {
        out.push_str(&format!("🏷 РРЦ (базовая): {} ₽\n", format_price(base)));
    }
    let discounts = discounts(car, "Госпрограмма");
    if !discounts.is_empty() {
        out.push_str("📉 Включенные скидки:\n");
        for d in discounts {
            out.push_str(&format!("- {d}\n"));
        }
    }
    out.push_str(&format!(
        "\n⏱ Срок поставки (если нет цвета): {} дней.\n\nХотите забронировать этот автомобиль или оформить заявку?",
        car.delivery_days.unwrap_or(default_delivery_days)
    ));
    out
}

/// Every cached variant on one screen.
pub fn compact_listing(offers: &[CarOffer]) -> String {
    let mut out = String::from("По Вашим вариантам:\n");
    for (i, car) in offers.iter().enumerate() {
        let mut colors: Vec<&str> = car.available_colors.iter().map(String::as_str).take(3).collect();
        if car.available_colors.len() > 3 {
            colors.push("...");
        }
        out.push_str(&format!("\n{}. {}\n   🎨 Цвета: {}\n", i + 1, car.model_name(), colors.join(", ")));
        let discount = car.total_discount();
        if discount > 0 {
            out.push_str(&format!("   📉 Скидки до: {} ₽\n", format_price(discount)));
        } else {
            out.push_str(&format!("   Цена без скидок: {} ₽\n", format_price(car.final_price)));
        }
    }
    out
}

pub fn color_in_stock(car: &CarOffer, color: &str) -> String {
    format!(
        "{} есть в наличии в цвете {color}. Хотите забронировать или посмотреть другие варианты?",
        car.full_name()
    )
}

pub fn color_on_order(days: u32) -> String {
    format!("Если цвета или комплектации нет в наличии, сможем привезти за {days} дней.")
}

pub fn other_colors(car: &CarOffer, default_delivery_days: u32) -> String {
    let colors = if car.available_colors.is_empty() {
        "сейчас отсутствуют".to_string()
    } else {
        car.available_colors.iter().cloned().collect::<Vec<_>>().join(", ")
    };
    format!(
        "{} сейчас есть в цветах: {colors}.\nДругие оттенки сможем привезти под заказ примерно за {} дней.",
        car.full_name(),
        car.delivery_days.unwrap_or(default_delivery_days)
    )
}

pub fn other_colors_generic(default_delivery_days: u32) -> String {
    format!(
        "Для указанных моделей, если нужного цвета нет в наличии, мы можем привезти автомобиль под заказ (срок поставки ~{default_delivery_days} дней)."
    )
}

fn intent_summary(intent: Intent) -> &'static str {
    match intent {
        Intent::BuyNew => "Вы ищете новый",
        Intent::BuyUsed => "Вы ищете б/у",
        Intent::Sell => "Вы хотите продать",
        Intent::Repair => "Вам нужен ремонт",
        Intent::Spares => "Вам нужны запчасти",
        Intent::Accounting => "У Вас вопрос по бухгалтерии",
        Intent::Other | Intent::FallbackOther => "Ваш запрос",
    }
}

/// "Иван, правильно понял: Вы ищете новый Chery кроссовер до 3.0 млн Ваш номер +791****4567?"
pub fn confirm_summary(session: &Session, default_name: &str) -> String {
    let mut parts = vec![
        format!("{}, правильно понял:", session.display_name(default_name)),
        intent_summary(session.intent).to_string(),
    ];
    if let Some(brand) = session.lead_brand() {
        parts.push(brand.to_string());
    }

    let slots = &session.slots;
    if session.intent.is_purchase() {
        if let Some(body) = &slots.body {
            parts.push(body.clone());
        }
        if let Some(budget) = slots.budget_max.filter(|b| *b < UNLIMITED_BUDGET) {
            if budget >= 1_000_000 {
                parts.push(format!("до {:.1} млн", budget as f64 / 1_000_000.0));
            } else {
                parts.push(format!("до {} руб.", format_price(budget)));
            }
        }
        if let Some(drive) = &slots.drive {
            parts.push(format!("({drive})"));
        }
    }
    if session.intent == Intent::Repair
        && let Some(repair_type) = slots.repair_type
    {
        parts.push(format!("({})", repair_type.label()));
    }

    match &session.phone {
        Some(phone) => parts.push(format!("Ваш номер {}?", mask_phone(phone))),
        None => parts.push("?".to_string()),
    }
    parts.join(" ")
}
