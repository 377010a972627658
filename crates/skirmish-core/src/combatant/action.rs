//! Actions a combatant can take.
//!
//! An action is a tagged variant: either one or more weapon-style sub-attacks
//! resolved together, or an area effect centered on a chosen cell.

use serde::{Deserialize, Serialize};

use crate::dice::DiceExpr;

use super::{Ability, DamageType};

/// Default melee reach in feet.
pub const DEFAULT_REACH_FT: u32 = 5;

/// One weapon-style strike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attack {
    /// Display name, e.g. `"Scimitar"`.
    pub name: String,
    /// Bonus added to the d20.
    pub to_hit: i32,
    /// Damage rolled on a hit.
    pub damage: DiceExpr,
    /// Damage type for mitigation.
    pub damage_type: DamageType,
    /// Melee reach in feet; `None` for purely ranged attacks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reach_ft: Option<u32>,
    /// Normal range in feet; `None` for purely melee attacks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_ft: Option<u32>,
}

impl Attack {
    /// A melee attack with the given reach.
    pub fn melee(
        name: impl Into<String>,
        to_hit: i32,
        damage: DiceExpr,
        damage_type: DamageType,
        reach_ft: u32,
    ) -> Self {
        Self {
            name: name.into(),
            to_hit,
            damage,
            damage_type,
            reach_ft: Some(reach_ft),
            range_ft: None,
        }
    }

    /// A ranged attack with the given normal range.
    pub fn ranged(
        name: impl Into<String>,
        to_hit: i32,
        damage: DiceExpr,
        damage_type: DamageType,
        range_ft: u32,
    ) -> Self {
        Self {
            name: name.into(),
            to_hit,
            damage,
            damage_type,
            reach_ft: None,
            range_ft: Some(range_ft),
        }
    }

    /// True if the attack has a melee reach.
    #[must_use]
    pub const fn is_melee(&self) -> bool {
        self.reach_ft.is_some()
    }

    /// The farthest distance this attack can be made at.
    ///
    /// A thrown weapon with both reach and range uses the larger.
    #[must_use]
    pub fn reach_or_range_ft(&self) -> u32 {
        match (self.reach_ft, self.range_ft) {
            (Some(r), Some(n)) => r.max(n),
            (Some(r), None) => r,
            (None, Some(n)) => n,
            (None, None) => DEFAULT_REACH_FT,
        }
    }
}

/// Area shape. Only spheres are modelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaShape {
    /// Everything within a radius of the center.
    #[default]
    Sphere,
}

/// Save-for-half area damage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaEffect {
    /// Shape of the area.
    #[serde(default)]
    pub shape: AreaShape,
    /// Radius in grid squares.
    pub radius: u32,
    /// Maximum distance from the caster to the center, in feet.
    pub range_ft: u32,
    /// Ability used for the save.
    pub save: Ability,
    /// Save difficulty class.
    pub dc: i32,
    /// Damage rolled once for every creature caught.
    pub damage: DiceExpr,
    /// Damage type for mitigation.
    pub damage_type: DamageType,
}

/// Charges an action spends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCost {
    /// Resource key, e.g. `"slot_3"`.
    pub resource: String,
    /// Charges consumed per use.
    pub amount: u32,
}

/// What an action does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// One attack, or a multiattack when more than one.
    Attacks(Vec<Attack>),
    /// An area effect centered on a cell.
    Area(AreaEffect),
}

/// A named capability.
///
/// # Example
///
/// ```
/// use skirmish_core::combatant::{Action, Attack, DamageType};
/// use skirmish_core::dice::DiceExpr;
///
/// let bite = Attack::melee("Bite", 4, DiceExpr::new(2, 4, 2), DamageType::Piercing, 5);
/// let claws = Attack::melee("Claws", 4, DiceExpr::new(1, 6, 2), DamageType::Slashing, 5);
/// let multi = Action::multiattack("Multiattack", vec![bite, claws]);
///
/// assert!(multi.is_multiattack());
/// assert_eq!(multi.attacks().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Unique name within the combatant.
    pub name: String,
    /// Attacks or area.
    pub kind: ActionKind,
    /// Charges spent on use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<ResourceCost>,
    /// Using this action starts a sustained effect.
    #[serde(default)]
    pub concentration: bool,
}

impl Action {
    /// A single-attack action named after the attack.
    #[must_use]
    pub fn attack(attack: Attack) -> Self {
        Self {
            name: attack.name.clone(),
            kind: ActionKind::Attacks(vec![attack]),
            cost: None,
            concentration: false,
        }
    }

    /// A multiattack.
    pub fn multiattack(name: impl Into<String>, attacks: Vec<Attack>) -> Self {
        Self {
            name: name.into(),
            kind: ActionKind::Attacks(attacks),
            cost: None,
            concentration: false,
        }
    }

    /// An area action.
    pub fn area(name: impl Into<String>, effect: AreaEffect) -> Self {
        Self {
            name: name.into(),
            kind: ActionKind::Area(effect),
            cost: None,
            concentration: false,
        }
    }

    /// Sets a resource cost.
    #[must_use]
    pub fn with_cost(mut self, resource: impl Into<String>, amount: u32) -> Self {
        self.cost = Some(ResourceCost {
            resource: resource.into(),
            amount,
        });
        self
    }

    /// Marks the action as a sustained effect.
    #[must_use]
    pub const fn sustained(mut self) -> Self {
        self.concentration = true;
        self
    }

    /// Sub-attacks, empty for area actions.
    #[must_use]
    pub fn attacks(&self) -> &[Attack] {
        match &self.kind {
            ActionKind::Attacks(attacks) => attacks,
            ActionKind::Area(_) => &[],
        }
    }

    /// The area effect, if this is an area action.
    #[must_use]
    pub const fn area_effect(&self) -> Option<&AreaEffect> {
        match &self.kind {
            ActionKind::Area(effect) => Some(effect),
            ActionKind::Attacks(_) => None,
        }
    }

    /// True for area actions.
    #[must_use]
    pub const fn is_area(&self) -> bool {
        matches!(self.kind, ActionKind::Area(_))
    }

    /// True for attack actions with more than one strike.
    #[must_use]
    pub fn is_multiattack(&self) -> bool {
        self.attacks().len() > 1
    }

    /// True if every sub-attack is ranged-only.
    #[must_use]
    pub fn is_ranged_only(&self) -> bool {
        let attacks = self.attacks();
        !attacks.is_empty() && attacks.iter().all(|a| !a.is_melee())
    }

    /// Largest distance any sub-attack can reach, or the area's range.
    #[must_use]
    pub fn max_reach_ft(&self) -> u32 {
        match &self.kind {
            ActionKind::Attacks(attacks) => attacks
                .iter()
                .map(Attack::reach_or_range_ft)
                .max()
                .unwrap_or(0),
            ActionKind::Area(effect) => effect.range_ft,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scimitar() -> Attack {
        Attack::melee("Scimitar", 4, DiceExpr::new(1, 6, 2), DamageType::Slashing, 5)
    }

    fn shortbow() -> Attack {
        Attack::ranged("Shortbow", 4, DiceExpr::new(1, 6, 2), DamageType::Piercing, 80)
    }

    #[test]
    fn single_attack_takes_attack_name() {
        let action = Action::attack(scimitar());
        assert_eq!(action.name, "Scimitar");
        assert!(!action.is_multiattack());
        assert!(!action.is_area());
    }

    #[test]
    fn reach_or_range() {
        assert_eq!(scimitar().reach_or_range_ft(), 5);
        assert_eq!(shortbow().reach_or_range_ft(), 80);

        let mut dagger = scimitar();
        dagger.range_ft = Some(20);
        assert_eq!(dagger.reach_or_range_ft(), 20);
    }

    #[test]
    fn max_reach_over_multiattack() {
        let action = Action::multiattack("Mixed", vec![scimitar(), shortbow()]);
        assert_eq!(action.max_reach_ft(), 80);
        assert!(!action.is_ranged_only());
        assert!(Action::attack(shortbow()).is_ranged_only());
    }

    #[test]
    fn area_has_no_attacks() {
        let fireball = Action::area(
            "Fireball",
            AreaEffect {
                shape: AreaShape::Sphere,
                radius: 4,
                range_ft: 150,
                save: Ability::Dex,
                dc: 15,
                damage: DiceExpr::new(8, 6, 0),
                damage_type: DamageType::Fire,
            },
        )
        .with_cost("slot_3", 1);

        assert!(fireball.is_area());
        assert!(fireball.attacks().is_empty());
        assert_eq!(fireball.max_reach_ft(), 150);
        assert_eq!(fireball.cost.as_ref().map(|c| c.amount), Some(1));
    }

    #[test]
    fn deserializes_loader_shape() {
        let json = r#"{
            "name": "Hold Person",
            "kind": { "area": {
                "radius": 0, "range_ft": 60, "save": "wis", "dc": 13,
                "damage": "0", "damage_type": "psychic"
            } },
            "cost": { "resource": "slot_2", "amount": 1 },
            "concentration": true
        }"#;
        let action: Action = serde_json::from_str(json).unwrap();
        assert!(action.concentration);
        assert_eq!(action.area_effect().map(|e| e.shape), Some(AreaShape::Sphere));
    }
}
